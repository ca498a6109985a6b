//! Channel markers, a closed set keyed by model family.

use crate::types::ModelFamily;

/// One thinking-block delimiter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPair {
    pub open: &'static str,
    pub close: &'static str,
}

pub const THINK_EN: MarkerPair = MarkerPair {
    open: "<think>",
    close: "</think>",
};

pub const THINK_CN: MarkerPair = MarkerPair {
    open: "<思考过程>",
    close: "</思考过程>",
};

/// Reasoning-channel framing, long and short forms.
pub const ANALYSIS_LONG: MarkerPair = MarkerPair {
    open: "<|start|>assistant<|channel|>analysis<|message|>",
    close: "<|end|>",
};

pub const ANALYSIS_SHORT: MarkerPair = MarkerPair {
    open: "<|channel|>analysis<|message|>",
    close: "<|end|>",
};

pub const FINAL_PREAMBLE_LONG: &str = "<|start|>assistant<|channel|>final<|message|>";
pub const FINAL_PREAMBLE_SHORT: &str = "<|channel|>final<|message|>";

/// The marker vocabulary the stream parser scans for.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    pub pairs: Vec<MarkerPair>,
    /// Strings stripped at the thinking→response boundary or at response
    /// start (the final-channel preamble family).
    pub preambles: Vec<&'static str>,
}

impl MarkerSet {
    /// The vocabulary for one model family. Only the reasoning-channel
    /// family emits analysis/final framing; for everything else those
    /// literals are ordinary text and must not be matched.
    pub fn for_family(family: ModelFamily) -> Self {
        match family {
            ModelFamily::GptOss => Self {
                // Longer variants first so the long analysis form wins
                // over the short one when both match at the same offset.
                pairs: vec![THINK_EN, THINK_CN, ANALYSIS_LONG, ANALYSIS_SHORT],
                preambles: vec![FINAL_PREAMBLE_LONG, FINAL_PREAMBLE_SHORT],
            },
            ModelFamily::Generic => Self {
                pairs: vec![THINK_EN, THINK_CN],
                preambles: vec![],
            },
        }
    }
    /// Every literal the parser must recognise, used for tail-buffer bounds
    /// and for filtering stray markers out of the response channel.
    pub fn all_literals(&self) -> Vec<&'static str> {
        let mut literals: Vec<&'static str> = Vec::new();
        for pair in &self.pairs {
            literals.push(pair.open);
            literals.push(pair.close);
        }
        literals.extend(self.preambles.iter().copied());
        literals.sort_by_key(|s| std::cmp::Reverse(s.len()));
        literals.dedup();
        literals
    }

    /// Upper bound for the unresolved-prefix tail buffer.
    pub fn longest_literal_len(&self) -> usize {
        self.all_literals().iter().map(|s| s.len()).max().unwrap_or(0)
    }
}
