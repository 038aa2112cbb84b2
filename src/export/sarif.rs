//! SARIF 2.1.0 导出
//!
//! 每个违规节点一条 result；规则元数据按规则 ID 去重，只写一次。

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{ExportError, ExportResult};
use crate::export::validate_outcome;
use crate::models::{RunReport, TestOutcome, Violation};

const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";
const SARIF_VERSION: &str = "2.1.0";
const TOOL_NAME: &str = "a11y-batch-audit";

#[derive(Debug, Clone, Serialize)]
pub struct SarifLog {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    pub information_uri: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRule {
    pub id: String,
    pub short_description: SarifMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_description: Option<SarifMessage>,
    pub help_uri: String,
    pub properties: SarifRuleProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct SarifRuleProperties {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SarifMessage {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: String,
    pub rule_index: usize,
    pub level: String,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLocation {
    pub physical_location: SarifPhysicalLocation,
    pub logical_locations: Vec<SarifLogicalLocation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifPhysicalLocation {
    pub artifact_location: SarifArtifactLocation,
    pub region: SarifRegion,
}

#[derive(Debug, Clone, Serialize)]
pub struct SarifArtifactLocation {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SarifRegion {
    pub snippet: SarifMessage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLogicalLocation {
    pub fully_qualified_name: String,
    pub kind: String,
}

impl SarifLog {
    pub fn to_json(&self) -> ExportResult<String> {
        serde_json::to_string_pretty(self).map_err(|source| ExportError::Serialization { source })
    }

    pub fn results(&self) -> &[SarifResult] {
        self.runs.first().map(|run| run.results.as_slice()).unwrap_or(&[])
    }

    pub fn rules(&self) -> &[SarifRule] {
        self.runs
            .first()
            .map(|run| run.tool.driver.rules.as_slice())
            .unwrap_or(&[])
    }
}

/// 规则表与结果列表的构建器
#[derive(Default)]
struct SarifBuilder {
    rules: Vec<SarifRule>,
    rule_index: HashMap<String, usize>,
    results: Vec<SarifResult>,
}

impl SarifBuilder {
    fn rule_index_for(&mut self, violation: &Violation) -> usize {
        if let Some(index) = self.rule_index.get(&violation.rule_id) {
            return *index;
        }
        let index = self.rules.len();
        self.rules.push(SarifRule {
            id: violation.rule_id.clone(),
            short_description: SarifMessage {
                text: violation.description.clone(),
            },
            full_description: violation
                .help
                .as_ref()
                .map(|help| SarifMessage { text: help.clone() }),
            help_uri: violation.help_url.clone(),
            properties: SarifRuleProperties {
                tags: violation.tags.iter().cloned().collect(),
            },
        });
        self.rule_index.insert(violation.rule_id.clone(), index);
        index
    }

    fn add_outcome(&mut self, outcome: &TestOutcome) -> ExportResult<()> {
        validate_outcome(outcome)?;
        for violation in &outcome.violations {
            let rule_index = self.rule_index_for(violation);
            for node in &violation.nodes {
                self.results.push(SarifResult {
                    rule_id: violation.rule_id.clone(),
                    rule_index,
                    level: violation.impact.sarif_level().as_str().to_string(),
                    message: SarifMessage {
                        text: format!("{}: {}", violation.impact, violation.description),
                    },
                    locations: vec![SarifLocation {
                        physical_location: SarifPhysicalLocation {
                            artifact_location: SarifArtifactLocation {
                                uri: outcome.url.clone(),
                            },
                            region: SarifRegion {
                                snippet: SarifMessage {
                                    text: node.markup_snippet.clone(),
                                },
                            },
                        },
                        logical_locations: vec![SarifLogicalLocation {
                            fully_qualified_name: node.target_selector.clone(),
                            kind: "element".to_string(),
                        }],
                    }],
                });
            }
        }
        Ok(())
    }

    fn finish(self) -> SarifLog {
        SarifLog {
            schema: SARIF_SCHEMA.to_string(),
            version: SARIF_VERSION.to_string(),
            runs: vec![SarifRun {
                tool: SarifTool {
                    driver: SarifDriver {
                        name: TOOL_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        information_uri: "https://www.w3.org/WAI/standards-guidelines/wcag/"
                            .to_string(),
                        rules: self.rules,
                    },
                },
                results: self.results,
            }],
        }
    }
}

/// 单个页面导出为 SARIF
pub fn outcome_to_sarif(outcome: &TestOutcome) -> ExportResult<SarifLog> {
    let mut builder = SarifBuilder::default();
    builder.add_outcome(outcome)?;
    Ok(builder.finish())
}

/// 整次运行导出为 SARIF（审计失败的页面不产生 result）
pub fn run_to_sarif(report: &RunReport) -> ExportResult<SarifLog> {
    let mut builder = SarifBuilder::default();
    for outcome in report.outcomes.iter().filter(|o| !o.is_failed()) {
        builder.add_outcome(outcome)?;
    }
    Ok(builder.finish())
}
