use std::collections::BTreeMap;

use crate::error::StoryreelResult;

/// A generated story, immutable once produced by a [`TextGenerator`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GeneratedStory {
    /// Opaque unique id; used to name the story's output artifacts.
    pub id: String,
    pub title: String,
    pub content: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

impl GeneratedStory {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            generated_at: chrono::Utc::now(),
        }
    }

    /// Non-empty paragraphs in narrative order.
    ///
    /// Paragraph order determines scene order and timeline order throughout
    /// the pipeline; callers must never reorder or deduplicate it.
    pub fn paragraphs(&self) -> Vec<&str> {
        self.content
            .lines()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Estimated reading time in minutes, assuming 300 characters/minute.
    pub fn estimated_reading_time_min(&self) -> u32 {
        let chars = self.content.chars().count() as f64;
        (chars / 300.0).ceil() as u32
    }
}

/// Inputs to story generation (supplied by the caller/scheduler).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StoryConfig {
    pub story_type: String,
    pub word_count: u32,
    pub style: String,
    pub keywords: Vec<String>,
    pub protagonist_name: String,
    pub setting: String,
    pub custom_prompt: Option<String>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            story_type: "爽文".to_string(),
            word_count: 2000,
            style: "热血沸腾".to_string(),
            keywords: Vec::new(),
            protagonist_name: "叶凡".to_string(),
            setting: "现代都市".to_string(),
            custom_prompt: None,
        }
    }
}

/// Abstraction over "generate text from a prompt".
///
/// Production implementations call a language model; tests substitute a
/// deterministic fake. The composition pipeline itself never depends on
/// this trait: stories arrive already generated.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> StoryreelResult<String>;
}

/// Prompt templates keyed by story type, constructed once and injected.
///
/// Placeholders: `{word_count}`, `{style}`, `{setting}`, `{protagonist}`,
/// `{keywords}`.
#[derive(Clone, Debug)]
pub struct StoryPrompts {
    templates: BTreeMap<String, String>,
    default_type: String,
}

impl Default for StoryPrompts {
    fn default() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            "爽文".to_string(),
            "写一篇{word_count}字的爽文小说，风格要求{style}。\n背景设定：{setting}\n主角：{protagonist}\n关键词：{keywords}\n\n要求：情节曲折刺激，主角一路逆袭，打脸情节痛快淋漓，语言热血沸腾，节奏要快。"
                .to_string(),
        );
        templates.insert(
            "玄幻".to_string(),
            "写一篇{word_count}字的玄幻小说，风格要求{style}。\n背景设定：{setting}\n主角：{protagonist}\n关键词：{keywords}\n\n要求：包含修炼体系、法宝、灵兽等玄幻元素，战斗场面宏大壮观，节奏紧凑，高潮迭起。"
                .to_string(),
        );
        templates.insert(
            "都市".to_string(),
            "写一篇{word_count}字的都市小说，风格要求{style}。\n背景设定：{setting}\n主角：{protagonist}\n关键词：{keywords}\n\n要求：贴近现实但有戏剧性，主角有特殊能力或奇遇，结局大快人心。"
                .to_string(),
        );
        templates.insert(
            "修仙".to_string(),
            "写一篇{word_count}字的修仙小说，风格要求{style}。\n背景设定：{setting}\n主角：{protagonist}\n关键词：{keywords}\n\n要求：有完整的修仙等级体系，包含炼丹、炼器、阵法等元素，仙界战斗场面宏大。"
                .to_string(),
        );
        Self {
            templates,
            default_type: "爽文".to_string(),
        }
    }
}

impl StoryPrompts {
    /// Template for a story type; unknown types resolve to the default.
    pub fn template(&self, story_type: &str) -> &str {
        self.templates
            .get(story_type)
            .or_else(|| self.templates.get(&self.default_type))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn build_prompt(&self, config: &StoryConfig) -> String {
        if let Some(custom) = &config.custom_prompt {
            return custom.clone();
        }
        self.template(&config.story_type)
            .replace("{word_count}", &config.word_count.to_string())
            .replace("{style}", &config.style)
            .replace("{setting}", &config.setting)
            .replace("{protagonist}", &config.protagonist_name)
            .replace("{keywords}", &config.keywords.join("、"))
    }
}
