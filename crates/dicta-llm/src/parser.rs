use crate::markers::{MarkerPair, MarkerSet};

/// A demultiplexed slice of the token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Thinking(String),
    Response(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Pre,
    Thinking { close: &'static str },
    Response,
}

/// Incremental channel demultiplexer.
///
/// Tokens may split markers across chunk boundaries; any unresolved marker
/// prefix at the end of a chunk is held in `tail` and re-prepended to the
/// next chunk. The tail never exceeds the longest marker literal.
pub struct StreamParser {
    markers: MarkerSet,
    literals: Vec<&'static str>,
    section: Section,
    tail: String,
}

impl StreamParser {
    pub fn new(markers: MarkerSet) -> Self {
        let literals = markers.all_literals();
        Self {
            markers,
            literals,
            section: Section::Pre,
            tail: String::new(),
        }
    }

    pub fn tail_len(&self) -> usize {
        self.tail.len()
    }

    /// Feed one token chunk, receiving zero or more demultiplexed pieces.
    pub fn push(&mut self, chunk: &str) -> Vec<Piece> {
        let mut buf = std::mem::take(&mut self.tail);
        buf.push_str(chunk);
        let mut out = Vec::new();

        loop {
            match self.section {
                Section::Pre => {
                    match self.earliest_transition(&buf) {
                        Some(Transition::Open { at, pair }) => {
                            // Content before the first marker streams as
                            // response text.
                            push_piece(&mut out, Piece::Response(buf[..at].to_string()));
                            buf = buf[at + pair.open.len()..].to_string();
                            self.section = Section::Thinking { close: pair.close };
                        }
                        Some(Transition::Preamble { at, literal }) => {
                            push_piece(&mut out, Piece::Response(buf[..at].to_string()));
                            buf = buf[at + literal.len()..].to_string();
                            self.section = Section::Response;
                        }
                        None => {
                            let hold = self.held_suffix_len(&buf);
                            let split = buf.len() - hold;
                            push_piece(&mut out, Piece::Response(buf[..split].to_string()));
                            self.tail = buf[split..].to_string();
                            break;
                        }
                    }
                }
                Section::Thinking { close } => {
                    if let Some(at) = buf.find(close) {
                        push_piece(&mut out, Piece::Thinking(buf[..at].to_string()));
                        buf = buf[at + close.len()..].to_string();
                        self.section = Section::Response;
                    } else {
                        let hold = self.held_suffix_len(&buf);
                        let split = buf.len() - hold;
                        push_piece(&mut out, Piece::Thinking(buf[..split].to_string()));
                        self.tail = buf[split..].to_string();
                        break;
                    }
                }
                Section::Response => {
                    // Stray markers (the final-channel preamble, trailing
                    // channel terminators, redundant closes) are filtered
                    // out of the response entirely.
                    if let Some((at, literal)) = self.earliest_literal(&buf) {
                        push_piece(&mut out, Piece::Response(buf[..at].to_string()));
                        buf = buf[at + literal.len()..].to_string();
                    } else {
                        let hold = self.held_suffix_len(&buf);
                        let split = buf.len() - hold;
                        push_piece(&mut out, Piece::Response(buf[..split].to_string()));
                        self.tail = buf[split..].to_string();
                        break;
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A tail that never completed a marker is
    /// literal text of the current section.
    pub fn finish(&mut self) -> Vec<Piece> {
        let rest = std::mem::take(&mut self.tail);
        let mut out = Vec::new();
        if !rest.is_empty() {
            let piece = match self.section {
                Section::Thinking { .. } => Piece::Thinking(rest),
                Section::Pre | Section::Response => Piece::Response(rest),
            };
            out.push(piece);
        }
        out
    }

    fn earliest_transition(&self, buf: &str) -> Option<Transition> {
        let mut best: Option<Transition> = None;
        for pair in &self.markers.pairs {
            if let Some(at) = buf.find(pair.open) {
                let candidate = Transition::Open { at, pair: *pair };
                if candidate.beats(&best) {
                    best = Some(candidate);
                }
            }
        }
        for &literal in &self.markers.preambles {
            if let Some(at) = buf.find(literal) {
                let candidate = Transition::Preamble { at, literal };
                if candidate.beats(&best) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn earliest_literal(&self, buf: &str) -> Option<(usize, &'static str)> {
        let mut best: Option<(usize, &'static str)> = None;
        // `literals` is sorted longest-first, so on equal offsets the
        // longer marker wins and short forms embedded in long ones lose.
        for &literal in &self.literals {
            if let Some(at) = buf.find(literal) {
                if best.map(|(b, _)| at < b).unwrap_or(true) {
                    best = Some((at, literal));
                }
            }
        }
        best
    }

    /// Length of the longest buffer suffix that is a proper prefix of some
    /// marker literal; that many bytes are withheld until the next chunk.
    fn held_suffix_len(&self, buf: &str) -> usize {
        let max_hold = self
            .markers
            .longest_literal_len()
            .saturating_sub(1)
            .min(buf.len());
        let start_min = buf.len() - max_hold;
        for p in start_min..buf.len() {
            if !buf.is_char_boundary(p) {
                continue;
            }
            let suffix = &buf.as_bytes()[p..];
            if self.literals.iter().any(|l| l.as_bytes().starts_with(suffix)) {
                return buf.len() - p;
            }
        }
        0
    }
}

enum Transition {
    Open { at: usize, pair: MarkerPair },
    Preamble { at: usize, literal: &'static str },
}

impl Transition {
    fn at(&self) -> usize {
        match self {
            Transition::Open { at, .. } | Transition::Preamble { at, .. } => *at,
        }
    }

    fn literal_len(&self) -> usize {
        match self {
            Transition::Open { pair, .. } => pair.open.len(),
            Transition::Preamble { literal, .. } => literal.len(),
        }
    }

    fn beats(&self, other: &Option<Transition>) -> bool {
        match other {
            None => true,
            Some(current) => {
                self.at() < current.at()
                    || (self.at() == current.at() && self.literal_len() > current.literal_len())
            }
        }
    }
}

fn push_piece(out: &mut Vec<Piece>, piece: Piece) {
    let empty = match &piece {
        Piece::Thinking(s) | Piece::Response(s) => s.is_empty(),
    };
    if !empty {
        out.push(piece);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelFamily;

    fn parser() -> StreamParser {
        StreamParser::new(MarkerSet::for_family(ModelFamily::GptOss))
    }

    fn collect(parser: &mut StreamParser, chunks: &[&str]) -> (String, String) {
        let mut thinking = String::new();
        let mut response = String::new();
        let mut pieces = Vec::new();
        for chunk in chunks {
            pieces.extend(parser.push(chunk));
        }
        pieces.extend(parser.finish());
        for piece in pieces {
            match piece {
                Piece::Thinking(s) => thinking.push_str(&s),
                Piece::Response(s) => response.push_str(&s),
            }
        }
        (thinking, response)
    }

    #[test]
    fn plain_stream_is_all_response() {
        let mut p = parser();
        let (thinking, response) = collect(&mut p, &["Hello ", "world."]);
        assert_eq!(thinking, "");
        assert_eq!(response, "Hello world.");
    }

    #[test]
    fn single_thinking_block() {
        let mut p = parser();
        let (thinking, response) =
            collect(&mut p, &["<think>I will fix the typo.</think>- Fixed text."]);
        assert_eq!(thinking, "I will fix the typo.");
        assert_eq!(response, "- Fixed text.");
    }

    #[test]
    fn thinking_text_equals_slice_between_markers() {
        // Parsing law: thinking equals the chunk slices between the
        // opening and closing markers, markers removed.
        let mut p = parser();
        let (thinking, _) = collect(
            &mut p,
            &["<think>", "part one, ", "part two.", "</think>", "done"],
        );
        assert_eq!(thinking, "part one, part two.");
    }

    #[test]
    fn chinese_markers_work() {
        let mut p = parser();
        let (thinking, response) =
            collect(&mut p, &["<思考过程>分析文本</思考过程>- 修正。"]);
        assert_eq!(thinking, "分析文本");
        assert_eq!(response, "- 修正。");
    }

    #[test]
    fn marker_split_across_chunks() {
        let mut p = parser();
        let (thinking, response) = collect(
            &mut p,
            &["<thi", "nk>reasoning</th", "ink>ok"],
        );
        assert_eq!(thinking, "reasoning");
        assert_eq!(response, "ok");
    }

    #[test]
    fn tail_is_bounded_by_longest_marker() {
        let mut p = parser();
        let bound = MarkerSet::for_family(ModelFamily::GptOss).longest_literal_len();
        for chunk in ["text <", "|start|", ">assistant<|chan"] {
            p.push(chunk);
            assert!(p.tail_len() < bound, "tail {} >= bound {}", p.tail_len(), bound);
        }
    }

    #[test]
    fn unfinished_marker_prefix_flushes_as_text() {
        let mut p = parser();
        let (thinking, response) = collect(&mut p, &["value <i.e. less-than"]);
        assert_eq!(thinking, "");
        assert_eq!(response, "value <i.e. less-than");
    }

    #[test]
    fn channel_tag_model_stream() {
        // End-to-end scenario for the reasoning-channel family.
        let mut p = parser();
        let (thinking, response) = collect(
            &mut p,
            &["<|channel|>analysis<|message|>Thinking A.<|end|><|start|>assistant<|channel|>final<|message|>- Result.\n"],
        );
        assert_eq!(thinking, "Thinking A.");
        assert_eq!(response, "- Result.\n");
    }

    #[test]
    fn long_form_analysis_open() {
        let mut p = parser();
        let (thinking, response) = collect(
            &mut p,
            &["<|start|>assistant<|channel|>analysis<|message|>deep thought<|end|><|channel|>final<|message|>answer"],
        );
        assert_eq!(thinking, "deep thought");
        assert_eq!(response, "answer");
    }

    #[test]
    fn chunk_equal_to_raw_marker_is_filtered() {
        let mut p = parser();
        let (thinking, response) = collect(
            &mut p,
            &["<think>", "t", "</think>", "<|end|>", "body"],
        );
        assert_eq!(thinking, "t");
        assert_eq!(response, "body");
    }

    #[test]
    fn redundant_close_after_exit_is_stripped() {
        let mut p = parser();
        let (thinking, response) = collect(&mut p, &["<think>a</think></think>rest"]);
        assert_eq!(thinking, "a");
        assert_eq!(response, "rest");
    }

    #[test]
    fn final_preamble_without_analysis_block() {
        let mut p = parser();
        let (thinking, response) =
            collect(&mut p, &["<|channel|>final<|message|>- Only answer."]);
        assert_eq!(thinking, "");
        assert_eq!(response, "- Only answer.");
    }

    #[test]
    fn content_before_thinking_streams_as_response() {
        let mut p = parser();
        let (thinking, response) = collect(&mut p, &["preface <think>x</think>tail"]);
        assert_eq!(thinking, "x");
        assert_eq!(response, "preface tail");
    }

    #[test]
    fn orphaned_thinking_flushes_on_finish() {
        let mut p = parser();
        let (thinking, response) = collect(&mut p, &["<think>never closed"]);
        assert_eq!(thinking, "never closed");
        assert_eq!(response, "");
    }

    #[test]
    fn generic_family_passes_channel_tags_through() {
        let mut p = StreamParser::new(MarkerSet::for_family(ModelFamily::Generic));
        let (thinking, response) = collect(
            &mut p,
            &["<think>a</think>text with <|end|> inside"],
        );
        assert_eq!(thinking, "a");
        assert_eq!(response, "text with <|end|> inside");
    }

    #[test]
    fn preamble_split_across_chunks() {
        let mut p = parser();
        let (thinking, response) = collect(
            &mut p,
            &[
                "<|channel|>analysis<|message|>A<|end|><|start|>assistant<|chan",
                "nel|>final<|message|>B",
            ],
        );
        assert_eq!(thinking, "A");
        assert_eq!(response, "B");
    }
}
