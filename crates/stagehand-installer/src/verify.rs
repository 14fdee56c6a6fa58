use anyhow::Result;
use stagehand_core::RequirementList;

use crate::PackageInstaller;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCheck {
    pub name: String,
    pub declaration: String,
    pub present: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checks: Vec<VerifyCheck>,
}

impl VerifyReport {
    pub fn all_present(&self) -> bool {
        self.checks.iter().all(|check| check.present)
    }

    pub fn missing(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|check| !check.present)
            .map(|check| check.name.as_str())
            .collect()
    }
}

/// Check every declaration's distribution for presence, in file order.
/// Unlike install this never short-circuits: the operator gets the full
/// list of missing packages in one pass.
pub fn verify_requirements(
    list: &RequirementList,
    primitive: &mut dyn PackageInstaller,
    mut observe: impl FnMut(&VerifyCheck),
) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();
    for line in list.declarations() {
        let declaration = line.trimmed();
        let name = distribution_name(declaration);
        let outcome = primitive.query(name)?;
        let check = VerifyCheck {
            name: name.to_string(),
            declaration: declaration.to_string(),
            present: outcome.succeeded(),
        };
        observe(&check);
        report.checks.push(check);
    }
    Ok(report)
}

/// The distribution name is the declaration text up to the first specifier,
/// extras, or marker character. The install path never uses this: there a
/// declaration is passed to the primitive verbatim.
pub fn distribution_name(declaration: &str) -> &str {
    let end = declaration
        .find(|ch: char| matches!(ch, '=' | '<' | '>' | '!' | '~' | '[' | ';') || ch.is_whitespace())
        .unwrap_or(declaration.len());
    &declaration[..end]
}
