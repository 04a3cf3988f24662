//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const BRANCH: &'static str = "branch";
    pub const REMOTE: &'static str = "remote";
    pub const VERSION: &'static str = "version";
    pub const TAG: &'static str = "tag";
    pub const MESSAGE: &'static str = "message";
    pub const TIMESTAMP: &'static str = "timestamp";
    pub const BUMP: &'static str = "bump";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}
