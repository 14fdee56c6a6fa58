use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    Blank,
    Declaration,
}

/// One line of a requirements file, kept with its original text so logs and
/// failure messages can name the declaration exactly as the operator wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementLine {
    raw: String,
    line_number: usize,
}

impl RequirementLine {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn trimmed(&self) -> &str {
        self.raw.trim()
    }

    /// 1-based position in the source file.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn kind(&self) -> LineKind {
        let trimmed = self.trimmed();
        if trimmed.is_empty() {
            LineKind::Blank
        } else if trimmed.starts_with('#') {
            LineKind::Comment
        } else {
            LineKind::Declaration
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.kind() == LineKind::Declaration
    }
}

/// An ordered requirements file. Order is significant: later declarations may
/// assume earlier ones are already installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementList {
    lines: Vec<RequirementLine>,
}

impl RequirementList {
    pub fn parse(input: &str) -> Self {
        let lines = input
            .lines()
            .enumerate()
            .map(|(index, raw)| RequirementLine {
                raw: raw.to_string(),
                line_number: index + 1,
            })
            .collect();
        Self { lines }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read requirements file: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn lines(&self) -> &[RequirementLine] {
        &self.lines
    }

    pub fn declarations(&self) -> impl Iterator<Item = &RequirementLine> {
        self.lines.iter().filter(|line| line.is_declaration())
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations().count()
    }
}
