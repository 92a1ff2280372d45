use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleType {
    Unboxing,
    #[default]
    Review,
    Tutorial,
    Showcase,
    Testimonial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaType {
    #[default]
    WanitaIndo,
    PriaIndo,
    Hijabers,
    ProductOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Portrait,
    Landscape,
}

pub const DURATIONS: [u8; 2] = [10, 15];
pub const MAX_BATCH_COUNT: u8 = 5;
pub const MAX_PRODUCT_NAME_LEN: usize = 100;
pub const MAX_HIGHLIGHT_LEN: usize = 500;

/// Generation form as edited by the user before submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FormConfig {
    pub image_url: Option<String>,
    pub product_name: String,
    pub highlight: String,
    pub style: StyleType,
    pub persona: PersonaType,
    pub aspect_ratio: AspectRatio,
    pub duration: u8,
    pub batch_count: u8,
    pub remove_watermark: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            image_url: None,
            product_name: String::new(),
            highlight: String::new(),
            style: StyleType::default(),
            persona: PersonaType::default(),
            aspect_ratio: AspectRatio::default(),
            duration: 10,
            batch_count: 1,
            remove_watermark: true,
        }
    }
}

impl FormConfig {
    /// Builds the request body, rejecting forms the backend would refuse.
    pub fn to_request(&self) -> Result<GenerateTaskRequest<'_>, String> {
        let image_url = self
            .image_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| "product image is required".to_string())?;

        let product_name = self.product_name.trim();
        if product_name.is_empty() || product_name.chars().count() > MAX_PRODUCT_NAME_LEN {
            return Err(format!(
                "product name must be 1-{} characters",
                MAX_PRODUCT_NAME_LEN
            ));
        }
        let highlight = self.highlight.trim();
        if highlight.is_empty() || highlight.chars().count() > MAX_HIGHLIGHT_LEN {
            return Err(format!("highlight must be 1-{} characters", MAX_HIGHLIGHT_LEN));
        }
        if !DURATIONS.contains(&self.duration) {
            return Err(format!("duration must be one of {:?}", DURATIONS));
        }
        if !(1..=MAX_BATCH_COUNT).contains(&self.batch_count) {
            return Err(format!("batch count must be 1-{}", MAX_BATCH_COUNT));
        }

        Ok(GenerateTaskRequest {
            image_url,
            product_name: &self.product_name,
            highlight: &self.highlight,
            style: self.style,
            persona: self.persona,
            aspect_ratio: self.aspect_ratio,
            duration: self.duration,
            batch_count: self.batch_count,
            remove_watermark: self.remove_watermark,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateTaskRequest<'a> {
    pub image_url: &'a str,
    pub product_name: &'a str,
    pub highlight: &'a str,
    pub style: StyleType,
    pub persona: PersonaType,
    pub aspect_ratio: AspectRatio,
    pub duration: u8,
    pub batch_count: u8,
    pub remove_watermark: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateTaskResponse {
    pub success: bool,
    #[serde(default)]
    pub task_ids: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewPromptRequest<'a> {
    pub product_name: &'a str,
    pub highlight: &'a str,
    pub style: StyleType,
    pub persona: PersonaType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewPromptResponse {
    pub prompt: String,
    pub style: String,
    pub persona: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filled() -> FormConfig {
        FormConfig {
            image_url: Some("https://img.host/p.png".into()),
            product_name: "Serum".into(),
            highlight: "glowing skin in 7 days".into(),
            ..FormConfig::default()
        }
    }

    #[test]
    fn request_body_uses_backend_names() {
        let form = filled();
        let body = serde_json::to_value(form.to_request().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "image_url": "https://img.host/p.png",
                "product_name": "Serum",
                "highlight": "glowing skin in 7 days",
                "style": "review",
                "persona": "wanita_indo",
                "aspect_ratio": "portrait",
                "duration": 10,
                "batch_count": 1,
                "remove_watermark": true
            })
        );
    }

    #[test]
    fn rejects_incomplete_forms() {
        assert!(FormConfig::default().to_request().is_err());

        let mut form = filled();
        form.highlight = "   ".into();
        assert!(form.to_request().is_err());

        let mut form = filled();
        form.duration = 12;
        assert!(form.to_request().is_err());

        let mut form = filled();
        form.batch_count = 6;
        assert!(form.to_request().is_err());
    }
}
