//! 违规严重程度及其唯一的映射表
//!
//! 颜色、SARIF 级别、排序权重都从 `IMPACT_TABLE` 读取，
//! 所有导出器和截图标注共用这一份数据。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;

/// 违规严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    Serious,
    Moderate,
    Minor,
}

/// SARIF 结果级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SarifLevel {
    Error,
    Warning,
    Note,
}

impl SarifLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SarifLevel::Error => "error",
            SarifLevel::Warning => "warning",
            SarifLevel::Note => "note",
        }
    }
}

/// 单个严重程度的展示属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactStyle {
    /// 标注颜色 (RGB)
    pub rgb: [u8; 3],
    /// 标签文字颜色 (RGB)
    pub label_rgb: [u8; 3],
    /// HTML 中使用的颜色
    pub css_color: &'static str,
    /// SARIF 级别
    pub sarif_level: SarifLevel,
    /// 排序权重，越大越严重
    pub rank: u8,
}

const IMPACT_TABLE: [(Impact, ImpactStyle); 4] = [
    (
        Impact::Critical,
        ImpactStyle {
            rgb: [220, 38, 38],
            label_rgb: [255, 255, 255],
            css_color: "#dc2626",
            sarif_level: SarifLevel::Error,
            rank: 4,
        },
    ),
    (
        Impact::Serious,
        ImpactStyle {
            rgb: [234, 88, 12],
            label_rgb: [255, 255, 255],
            css_color: "#ea580c",
            sarif_level: SarifLevel::Error,
            rank: 3,
        },
    ),
    (
        Impact::Moderate,
        ImpactStyle {
            rgb: [234, 179, 8],
            label_rgb: [0, 0, 0],
            css_color: "#eab308",
            sarif_level: SarifLevel::Warning,
            rank: 2,
        },
    ),
    (
        Impact::Minor,
        ImpactStyle {
            rgb: [22, 163, 74],
            label_rgb: [255, 255, 255],
            css_color: "#16a34a",
            sarif_level: SarifLevel::Note,
            rank: 1,
        },
    ),
];

impl Impact {
    /// 按严重程度从高到低排列
    pub const ALL: [Impact; 4] = [
        Impact::Critical,
        Impact::Serious,
        Impact::Moderate,
        Impact::Minor,
    ];

    /// 获取展示属性
    pub fn style(self) -> &'static ImpactStyle {
        let (_, style) = IMPACT_TABLE
            .iter()
            .find(|(impact, _)| *impact == self)
            .unwrap_or(&IMPACT_TABLE[3]);
        style
    }

    pub fn rank(self) -> u8 {
        self.style().rank
    }

    pub fn sarif_level(self) -> SarifLevel {
        self.style().sarif_level
    }

    pub fn css_color(self) -> &'static str {
        self.style().css_color
    }

    /// 小写名称（与规则引擎输出一致）
    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::Serious => "serious",
            Impact::Moderate => "moderate",
            Impact::Minor => "minor",
        }
    }

    /// 从规则引擎的字符串解析
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Impact::Critical),
            "serious" => Some(Impact::Serious),
            "moderate" => Some(Impact::Moderate),
            "minor" => Some(Impact::Minor),
            _ => None,
        }
    }
}

impl PartialOrd for Impact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Impact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 各严重程度的违规数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactBreakdown {
    pub critical: usize,
    pub serious: usize,
    pub moderate: usize,
    pub minor: usize,
}

impl ImpactBreakdown {
    pub fn add(&mut self, impact: Impact, count: usize) {
        match impact {
            Impact::Critical => self.critical += count,
            Impact::Serious => self.serious += count,
            Impact::Moderate => self.moderate += count,
            Impact::Minor => self.minor += count,
        }
    }

    pub fn get(&self, impact: Impact) -> usize {
        match impact {
            Impact::Critical => self.critical,
            Impact::Serious => self.serious,
            Impact::Moderate => self.moderate,
            Impact::Minor => self.minor,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.serious + self.moderate + self.minor
    }

    pub fn merge(&mut self, other: &ImpactBreakdown) {
        for impact in Impact::ALL {
            self.add(impact, other.get(impact));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_critical_highest() {
        let mut impacts = vec![Impact::Minor, Impact::Critical, Impact::Moderate, Impact::Serious];
        impacts.sort_by(|a, b| b.cmp(a));
        assert_eq!(impacts, Impact::ALL.to_vec());
        assert!(Impact::Critical > Impact::Serious);
        assert!(Impact::Moderate > Impact::Minor);
    }

    #[test]
    fn test_sarif_level_mapping() {
        assert_eq!(Impact::Critical.sarif_level(), SarifLevel::Error);
        assert_eq!(Impact::Serious.sarif_level(), SarifLevel::Error);
        assert_eq!(Impact::Moderate.sarif_level(), SarifLevel::Warning);
        assert_eq!(Impact::Minor.sarif_level(), SarifLevel::Note);
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!(Impact::parse(" Serious "), Some(Impact::Serious));
        assert_eq!(Impact::parse("unknown"), None);
        let json = serde_json::to_string(&Impact::Moderate).unwrap();
        assert_eq!(json, "\"moderate\"");
    }

    #[test]
    fn test_breakdown_merge() {
        let mut a = ImpactBreakdown::default();
        a.add(Impact::Critical, 2);
        let mut b = ImpactBreakdown::default();
        b.add(Impact::Critical, 1);
        b.add(Impact::Minor, 4);
        a.merge(&b);
        assert_eq!(a.critical, 3);
        assert_eq!(a.minor, 4);
        assert_eq!(a.total(), 7);
    }
}
