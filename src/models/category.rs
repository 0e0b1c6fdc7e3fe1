use crate::error::ConfigError;

/// 实体类别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// 基因
    Genes,
    /// 药物、化学物质
    Substances,
    /// 疾病、生理状态
    Conditions,
    /// 蛋白质
    Proteins,
}

impl Category {
    /// 全部类别（按摘要顺序）
    pub const ALL: [Category; 4] = [
        Category::Genes,
        Category::Substances,
        Category::Conditions,
        Category::Proteins,
    ];

    /// 摘要端点识别的提取模式名称
    pub fn si_mode(self) -> &'static str {
        match self {
            Category::Genes => "GENES_EXTRACTION",
            Category::Substances => "SUBSTANCES_EXTRACTION",
            Category::Conditions => "CONDITIONS_EXTRACTION",
            Category::Proteins => "PROTEINS_EXTRACTION",
        }
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Category::Genes => "genes",
            Category::Substances => "substances",
            Category::Conditions => "conditions",
            Category::Proteins => "proteins",
        }
    }

    /// 提示词中使用的实体描述
    pub fn entity_description(self) -> &'static str {
        match self {
            Category::Genes => "gene",
            Category::Substances => "drug, chemical or pharmacological substance",
            Category::Conditions => "disease or physiological condition",
            Category::Proteins => "protein",
        }
    }
}

/// 从字符串解析类别
///
/// 同时接受标准名称和提取模式名称，不区分大小写
impl std::str::FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "genes" | "gene" | "genes_extraction" => Ok(Category::Genes),
            "substances" | "substance" | "substances_extraction" => Ok(Category::Substances),
            "conditions" | "condition" | "conditions_extraction" => Ok(Category::Conditions),
            "proteins" | "protein" | "proteins_extraction" => Ok(Category::Proteins),
            _ => Err(ConfigError::InvalidValue {
                name: "category".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
