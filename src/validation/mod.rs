//! Input and Output Validation Module
//!
//! Structural and semantic checks for chart input, score distributions and
//! assembled outputs. Input checks collect every problem instead of stopping
//! at the first one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::error::{EngineError, Result};
use crate::models::{
    AlgorithmOutput, Branch, Chart, ChartInput, Element, Gender, Pillar, PillarInput,
    PillarPosition, RelationDistribution, Stem, SUM_TOLERANCE,
};

/// Validation issue types
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationIssue {
    #[error("Required field '{field}' is missing")]
    MissingField { field: String },

    #[error("Field '{field}' is not a valid stem: {value}")]
    InvalidStem { field: String, value: String },

    #[error("Field '{field}' is not a valid branch: {value}")]
    InvalidBranch { field: String, value: String },

    #[error("Gender must be 'male' or 'female', got: {value}")]
    InvalidGender { value: String },

    #[error("Field '{field}' is out of range: min={min}, max={max}, got={got}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        got: i64,
    },

    #[error("Field '{field}' is not a real calendar date: {year}-{month}-{day}")]
    InvalidDate {
        field: String,
        year: i32,
        month: u32,
        day: u32,
    },

    #[error("Strength of '{field}' must be finite and non-negative, got: {value}")]
    InvalidStrength { field: String, value: f64 },
}

impl ValidationIssue {
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } => field.as_str(),
            Self::InvalidStem { field, .. } => field.as_str(),
            Self::InvalidBranch { field, .. } => field.as_str(),
            Self::InvalidGender { .. } => "gender",
            Self::OutOfRange { field, .. } => field.as_str(),
            Self::InvalidDate { field, .. } => field.as_str(),
            Self::InvalidStrength { field, .. } => field.as_str(),
        }
    }
}

/// 输入校验结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputValidation {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

/// 输出校验结果，警告不阻止使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
}

/// Check a chart input without failing
pub fn validate_input(input: &ChartInput) -> InputValidation {
    let (errors, _) = inspect(input);
    InputValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Resolve a chart input into its typed form, or fail with every issue found
pub fn resolve_chart(input: &ChartInput) -> Result<Chart> {
    match inspect(input) {
        (errors, Some(chart)) if errors.is_empty() => Ok(chart),
        (errors, _) => Err(EngineError::Validation { errors }),
    }
}

/// Reject distributions holding negative or non-finite strengths
pub fn validate_distribution(distribution: &RelationDistribution) -> Result<()> {
    let errors: Vec<ValidationIssue> = distribution
        .iter()
        .filter(|(_, value)| !value.is_finite() || *value < 0.0)
        .map(|(god, value)| ValidationIssue::InvalidStrength {
            field: god.hanzi().to_string(),
            value,
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation { errors })
    }
}

/// Sanity-check an assembled output
pub fn validate_output(output: &AlgorithmOutput) -> OutputValidation {
    let mut warnings = Vec::new();

    let total = output.distribution.total();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        warnings.push(format!("十神强度总和偏离 1.0: {:.6}", total));
    }
    for (god, value) in output.distribution.iter() {
        if !value.is_finite() || value < 0.0 {
            warnings.push(format!("十神 {} 强度异常: {}", god, value));
        }
    }

    for (capability, score) in output.scores.iter() {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            warnings.push(format!("能力 {} 分数超出范围: {}", capability, score));
        }
    }

    let cluster_total = output.clusters.total();
    if (cluster_total - 1.0).abs() > SUM_TOLERANCE {
        warnings.push(format!("聚合指标总和偏离 1.0: {:.6}", cluster_total));
    }

    let confidence = output.pattern.confidence;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        warnings.push(format!("格局置信度超出范围: {}", confidence));
    }

    let roots = &output.diagnostics.strength.element_roots;
    if Element::ALL
        .iter()
        .all(|e| roots.get(e).copied().unwrap_or(0.0) <= 0.0)
    {
        warnings.push("五行通根分数全部为零".to_string());
    }

    OutputValidation {
        valid: warnings.is_empty(),
        warnings,
    }
}

fn inspect(input: &ChartInput) -> (Vec<ValidationIssue>, Option<Chart>) {
    let mut errors = Vec::new();

    let mut pillars = [None; 4];
    for (slot, position) in pillars.iter_mut().zip(PillarPosition::ALL) {
        *slot = inspect_pillar(position, input.pillars.get(position), &mut errors);
    }

    let gender = match input.gender.trim() {
        "" => {
            errors.push(ValidationIssue::MissingField {
                field: "gender".to_string(),
            });
            None
        }
        raw => match raw.parse::<Gender>() {
            Ok(gender) => Some(gender),
            Err(_) => {
                errors.push(ValidationIssue::InvalidGender {
                    value: input.gender.clone(),
                });
                None
            }
        },
    };

    match &input.solar {
        None => errors.push(ValidationIssue::MissingField {
            field: "solar".to_string(),
        }),
        Some(solar) => match solar.validate() {
            Err(e) => errors.extend(range_issues("solar", &e)),
            Ok(()) => {
                if NaiveDate::from_ymd_opt(solar.year, solar.month, solar.day).is_none() {
                    errors.push(ValidationIssue::InvalidDate {
                        field: "solar".to_string(),
                        year: solar.year,
                        month: solar.month,
                        day: solar.day,
                    });
                }
            }
        },
    }

    if let Some(lunar) = &input.lunar {
        if let Err(e) = lunar.validate() {
            errors.extend(range_issues("lunar", &e));
        }
    }

    let chart = match (pillars, gender, input.solar) {
        ([Some(year), Some(month), Some(day), Some(hour)], Some(gender), Some(solar))
            if errors.is_empty() =>
        {
            Some(Chart {
                year,
                month,
                day,
                hour,
                gender,
                solar,
                lunar: input.lunar,
            })
        }
        _ => None,
    };

    (errors, chart)
}

fn inspect_pillar(
    position: PillarPosition,
    pillar: Option<&PillarInput>,
    errors: &mut Vec<ValidationIssue>,
) -> Option<Pillar> {
    let Some(pillar) = pillar else {
        errors.push(ValidationIssue::MissingField {
            field: format!("pillars.{}", position),
        });
        return None;
    };

    let stem_field = format!("pillars.{}.stem", position);
    let stem = if pillar.stem.trim().is_empty() {
        errors.push(ValidationIssue::MissingField { field: stem_field });
        None
    } else {
        match pillar.stem.parse::<Stem>() {
            Ok(stem) => Some(stem),
            Err(_) => {
                errors.push(ValidationIssue::InvalidStem {
                    field: stem_field,
                    value: pillar.stem.clone(),
                });
                None
            }
        }
    };

    let branch_field = format!("pillars.{}.branch", position);
    let branch = if pillar.branch.trim().is_empty() {
        errors.push(ValidationIssue::MissingField {
            field: branch_field,
        });
        None
    } else {
        match pillar.branch.parse::<Branch>() {
            Ok(branch) => Some(branch),
            Err(_) => {
                errors.push(ValidationIssue::InvalidBranch {
                    field: branch_field,
                    value: pillar.branch.clone(),
                });
                None
            }
        }
    };

    Some(Pillar {
        stem: stem?,
        branch: branch?,
    })
}

fn range_issues(prefix: &str, errors: &validator::ValidationErrors) -> Vec<ValidationIssue> {
    let mut issues: Vec<ValidationIssue> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |e| {
                let param = |key: &str| {
                    e.params
                        .get(key)
                        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
                        .unwrap_or(0)
                };
                ValidationIssue::OutOfRange {
                    field: format!("{}.{}", prefix, field),
                    min: param("min"),
                    max: param("max"),
                    got: param("value"),
                }
            })
        })
        .collect();
    // field_errors 是 HashMap，排序保证输出稳定
    issues.sort_by(|a, b| a.field().cmp(b.field()));
    issues
}
