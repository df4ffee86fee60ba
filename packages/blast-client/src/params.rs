//! Typed search parameters for the BLAST URL API.
//!
//! Every enumeration maps one-to-one onto the value the service expects for
//! the corresponding URL parameter. `SubmissionParams::validate` enforces the
//! documented sign and range constraints before anything is sent.

use std::fmt;
use std::str::FromStr;

use crate::error::{BlastError, Result};

/// BLAST program to run.
///
/// `Megablast` is not a separate program on the service: it is sent as
/// `PROGRAM=blastn` with `MEGABLAST=on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    Blastn,
    Megablast,
    Blastp,
    Blastx,
    Tblastn,
    Tblastx,
}

impl Program {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blastn => "blastn",
            Self::Megablast => "megablast",
            Self::Blastp => "blastp",
            Self::Blastx => "blastx",
            Self::Tblastn => "tblastn",
            Self::Tblastx => "tblastx",
        }
    }

    /// Value of the `PROGRAM` parameter.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Megablast => "blastn",
            other => other.as_str(),
        }
    }

    /// Whether nucleotide reward/penalty scoring applies.
    pub fn uses_nucleotide_scoring(&self) -> bool {
        matches!(self, Self::Blastn | Self::Megablast)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Program {
    type Err = BlastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blastn" => Ok(Self::Blastn),
            "megablast" => Ok(Self::Megablast),
            "blastp" => Ok(Self::Blastp),
            "blastx" => Ok(Self::Blastx),
            "tblastn" => Ok(Self::Tblastn),
            "tblastx" => Ok(Self::Tblastx),
            other => Err(BlastError::invalid(
                "program",
                format!("unknown program '{}'", other),
            )),
        }
    }
}

/// Report format (`FORMAT_TYPE`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FormatType {
    #[default]
    Html,
    Text,
    Xml,
    Xml2,
    Json2,
    Tabular,
}

impl FormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Text => "Text",
            Self::Xml => "XML",
            Self::Xml2 => "XML2",
            Self::Json2 => "JSON2",
            Self::Tabular => "Tabular",
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatType {
    type Err = BlastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "text" => Ok(Self::Text),
            "xml" => Ok(Self::Xml),
            "xml2" => Ok(Self::Xml2),
            "json2" => Ok(Self::Json2),
            "tabular" => Ok(Self::Tabular),
            other => Err(BlastError::invalid(
                "format",
                format!("unknown format '{}'", other),
            )),
        }
    }
}

/// Protein scoring matrix (`MATRIX`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoringMatrix {
    Blosum45,
    Blosum50,
    Blosum62,
    Blosum80,
    Blosum90,
    Pam250,
    Pam30,
    Pam70,
}

impl ScoringMatrix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blosum45 => "BLOSUM45",
            Self::Blosum50 => "BLOSUM50",
            Self::Blosum62 => "BLOSUM62",
            Self::Blosum80 => "BLOSUM80",
            Self::Blosum90 => "BLOSUM90",
            Self::Pam250 => "PAM250",
            Self::Pam30 => "PAM30",
            Self::Pam70 => "PAM70",
        }
    }
}

impl FromStr for ScoringMatrix {
    type Err = BlastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BLOSUM45" => Ok(Self::Blosum45),
            "BLOSUM50" => Ok(Self::Blosum50),
            "BLOSUM62" => Ok(Self::Blosum62),
            "BLOSUM80" => Ok(Self::Blosum80),
            "BLOSUM90" => Ok(Self::Blosum90),
            "PAM250" => Ok(Self::Pam250),
            "PAM30" => Ok(Self::Pam30),
            "PAM70" => Ok(Self::Pam70),
            other => Err(BlastError::invalid(
                "matrix",
                format!("unknown scoring matrix '{}'", other),
            )),
        }
    }
}

/// Low-complexity filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// `F`
    Disabled,
    /// `T`
    Enabled,
    /// `L`
    LowComplexity,
}

/// Value of the `FILTER` parameter: a mode, optionally masked at lookup only (`m` prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Filter {
    pub mode: FilterMode,
    pub mask_at_lookup: bool,
}

impl Filter {
    pub fn disabled() -> Self {
        Self {
            mode: FilterMode::Disabled,
            mask_at_lookup: false,
        }
    }

    pub fn low_complexity() -> Self {
        Self {
            mode: FilterMode::LowComplexity,
            mask_at_lookup: false,
        }
    }

    pub fn masked_at_lookup(mut self) -> Self {
        self.mask_at_lookup = true;
        self
    }

    pub fn to_param(&self) -> String {
        let mode = match self.mode {
            FilterMode::Disabled => "F",
            FilterMode::Enabled => "T",
            FilterMode::LowComplexity => "L",
        };
        if self.mask_at_lookup {
            format!("m{}", mode)
        } else {
            mode.to_string()
        }
    }
}

impl FromStr for Filter {
    type Err = BlastError;

    fn from_str(s: &str) -> Result<Self> {
        let (mask_at_lookup, rest) = match s.strip_prefix('m') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mode = match rest {
            "F" => FilterMode::Disabled,
            "T" => FilterMode::Enabled,
            "L" => FilterMode::LowComplexity,
            _ => {
                return Err(BlastError::invalid(
                    "filter",
                    format!("expected F, T, L, mT or mL, got '{}'", s),
                ))
            }
        };
        Ok(Self {
            mode,
            mask_at_lookup,
        })
    }
}

/// Gap existence and extension costs (`GAPCOSTS`, sent as `"11 1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GapCosts {
    pub existence: u32,
    pub extension: u32,
}

impl GapCosts {
    pub fn new(existence: u32, extension: u32) -> Self {
        Self {
            existence,
            extension,
        }
    }

    pub fn to_param(&self) -> String {
        format!("{} {}", self.existence, self.extension)
    }
}

impl FromStr for GapCosts {
    type Err = BlastError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        let parse = |v: &str| {
            v.parse::<u32>().map_err(|_| {
                BlastError::invalid("gap_costs", format!("'{}' is not a positive integer", v))
            })
        };
        match parts.as_slice() {
            [existence, extension] => Ok(Self::new(parse(*existence)?, parse(*extension)?)),
            _ => Err(BlastError::invalid(
                "gap_costs",
                format!("expected two space-separated integers, got '{}'", s),
            )),
        }
    }
}

/// Composition-based statistics algorithm (`COMPOSITION_BASED_STATISTICS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionStats {
    None = 0,
    Composition = 1,
    ConditionalAdjustment = 2,
    UniversalAdjustment = 3,
}

impl TryFrom<u8> for CompositionStats {
    type Error = BlastError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Composition),
            2 => Ok(Self::ConditionalAdjustment),
            3 => Ok(Self::UniversalAdjustment),
            other => Err(BlastError::invalid(
                "composition_stats",
                format!("must be one of 0, 1, 2 or 3, got {}", other),
            )),
        }
    }
}

/// Object requested from a `CMD=Get` call (`FORMAT_OBJECT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatObject {
    /// Status check
    SearchInfo,
    /// Report formatting
    Alignment,
}

impl FormatObject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchInfo => "SearchInfo",
            Self::Alignment => "Alignment",
        }
    }
}

/// Optional scoring and formatting knobs. Unset fields are never sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub expect: Option<f64>,
    pub reward: Option<i32>,
    pub penalty: Option<i32>,
    pub gap_costs: Option<GapCosts>,
    pub matrix: Option<ScoringMatrix>,
    pub hitlist_size: Option<u32>,
    pub descriptions: Option<u32>,
    pub alignments: Option<u32>,
    pub ncbi_gi: Option<bool>,
    pub threshold: Option<u32>,
    pub word_size: Option<u32>,
    pub composition_stats: Option<CompositionStats>,
    pub filter: Option<Filter>,
}

/// One search submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionParams {
    /// Raw sequence, accession/GI, or FASTA text
    pub query: String,
    pub database: String,
    pub program: Program,
    pub format: FormatType,
    pub options: SearchOptions,
}

impl SubmissionParams {
    pub fn new(query: impl Into<String>, database: impl Into<String>, program: Program) -> Self {
        Self {
            query: query.into(),
            database: database.into(),
            program,
            format: FormatType::default(),
            options: SearchOptions::default(),
        }
    }

    pub fn with_format(mut self, format: FormatType) -> Self {
        self.format = format;
        self
    }

    pub fn with_expect(mut self, expect: f64) -> Self {
        self.options.expect = Some(expect);
        self
    }

    pub fn with_reward(mut self, reward: i32) -> Self {
        self.options.reward = Some(reward);
        self
    }

    pub fn with_penalty(mut self, penalty: i32) -> Self {
        self.options.penalty = Some(penalty);
        self
    }

    pub fn with_gap_costs(mut self, gap_costs: GapCosts) -> Self {
        self.options.gap_costs = Some(gap_costs);
        self
    }

    pub fn with_matrix(mut self, matrix: ScoringMatrix) -> Self {
        self.options.matrix = Some(matrix);
        self
    }

    pub fn with_hitlist_size(mut self, size: u32) -> Self {
        self.options.hitlist_size = Some(size);
        self
    }

    pub fn with_descriptions(mut self, count: u32) -> Self {
        self.options.descriptions = Some(count);
        self
    }

    pub fn with_alignments(mut self, count: u32) -> Self {
        self.options.alignments = Some(count);
        self
    }

    pub fn with_ncbi_gi(mut self, show: bool) -> Self {
        self.options.ncbi_gi = Some(show);
        self
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.options.threshold = Some(threshold);
        self
    }

    pub fn with_word_size(mut self, word_size: u32) -> Self {
        self.options.word_size = Some(word_size);
        self
    }

    pub fn with_composition_stats(mut self, stats: CompositionStats) -> Self {
        self.options.composition_stats = Some(stats);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.options.filter = Some(filter);
        self
    }

    /// Check every documented constraint. Runs before any request is built.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(BlastError::invalid("query", "must not be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(BlastError::invalid("database", "must not be empty"));
        }

        let opts = &self.options;
        if let Some(expect) = opts.expect {
            if !expect.is_finite() || expect <= 0.0 {
                return Err(BlastError::invalid(
                    "expect",
                    format!("must be a number greater than zero, got {}", expect),
                ));
            }
        }
        if let Some(reward) = opts.reward {
            if reward <= 0 {
                return Err(BlastError::invalid(
                    "reward",
                    format!("must be greater than zero, got {}", reward),
                ));
            }
        }
        if let Some(penalty) = opts.penalty {
            if penalty >= 0 {
                return Err(BlastError::invalid(
                    "penalty",
                    format!("must be less than zero, got {}", penalty),
                ));
            }
        }
        if (opts.reward.is_some() || opts.penalty.is_some())
            && !self.program.uses_nucleotide_scoring()
        {
            return Err(BlastError::invalid(
                "reward",
                format!("reward/penalty only apply to blastn and megablast, not {}", self.program),
            ));
        }
        if let Some(gap) = opts.gap_costs {
            if gap.existence == 0 || gap.extension == 0 {
                return Err(BlastError::invalid(
                    "gap_costs",
                    format!("both costs must be positive, got '{}'", gap.to_param()),
                ));
            }
        }
        if opts.threshold.is_some() && self.program.uses_nucleotide_scoring() {
            return Err(BlastError::invalid(
                "threshold",
                format!("does not apply to {}", self.program),
            ));
        }
        if let Some(filter) = opts.filter {
            if filter.mode == FilterMode::Disabled && filter.mask_at_lookup {
                return Err(BlastError::invalid(
                    "filter",
                    "mask at lookup requires filtering to be enabled",
                ));
            }
        }

        let counts = [
            ("hitlist_size", opts.hitlist_size),
            ("descriptions", opts.descriptions),
            ("alignments", opts.alignments),
            ("threshold", opts.threshold),
            ("word_size", opts.word_size),
        ];
        for (field, value) in counts {
            if value == Some(0) {
                return Err(BlastError::invalid(field, "must be greater than zero"));
            }
        }

        Ok(())
    }
}
