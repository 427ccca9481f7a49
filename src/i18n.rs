use std::collections::HashMap;
use std::sync::OnceLock;

/// Global localization state
static LOCALIZER: OnceLock<Localizer> = OnceLock::new();

/// Initialize the global localizer. Safe to call more than once.
pub fn init() {
    localizer();
}

fn localizer() -> &'static Localizer {
    LOCALIZER.get_or_init(Localizer::new)
}

/// Get a localized message by key
pub fn t(key: &str) -> String {
    localizer().get(key)
}

/// Get a localized message by key with `{$name}` placeholders filled in
pub fn t_with_args(key: &str, args: &[(&str, &dyn std::fmt::Display)]) -> String {
    localizer().get_with_args(key, args)
}

/// Localization manager
#[derive(Debug)]
pub struct Localizer {
    messages: HashMap<String, String>,
    fallback: HashMap<String, String>,
}

const EN: &str = include_str!("../locales/en.ftl");
const NN: &str = include_str!("../locales/nn.ftl");

impl Localizer {
    fn new() -> Self {
        let language = Self::detect_language();
        Self {
            messages: Self::load_messages(&language),
            fallback: Self::parse(EN),
        }
    }

    fn detect_language() -> String {
        // Check environment variables in order of preference
        let lang_vars = ["LC_ALL", "LC_MESSAGES", "LANG"];

        for var in &lang_vars {
            if let Ok(value) = std::env::var(var) {
                // "nn_NO.UTF-8" -> "nn"
                let lang_code = value
                    .split(['.', '_', '-'])
                    .next()
                    .unwrap_or_default()
                    .to_lowercase();

                match lang_code.as_str() {
                    "nn" | "nno" => return "nn".to_string(),
                    "en" => return "en".to_string(),
                    _ => continue,
                }
            }
        }

        // Default to English
        "en".to_string()
    }

    fn load_messages(language: &str) -> HashMap<String, String> {
        let content = match language {
            "nn" => NN,
            _ => EN,
        };
        Self::parse(content)
    }

    // Simple `key = value` lines, `#` comments
    fn parse(content: &str) -> HashMap<String, String> {
        let mut messages = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once(" = ") {
                messages.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        messages
    }

    fn get(&self, key: &str) -> String {
        self.messages
            .get(key)
            .or_else(|| self.fallback.get(key))
            .cloned()
            .unwrap_or_else(|| {
                eprintln!("Missing translation key: {key}");
                format!("MISSING: {key}")
            })
    }

    fn get_with_args(&self, key: &str, args: &[(&str, &dyn std::fmt::Display)]) -> String {
        let mut message = self.get(key);

        for (var_name, value) in args {
            let placeholder = format!("{{${var_name}}}");
            message = message.replace(&placeholder, &format!("{value}"));
        }

        // literal line breaks in .ftl values
        message.replace("\\n", "\n")
    }
}

// Convenience macros for common usage patterns
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::t($key)
    };
}

#[macro_export]
macro_rules! t_args {
    ($key:expr, $($name:expr => $value:expr),*) => {{
        let args: &[(&str, &dyn std::fmt::Display)] = &[
            $(
                ($name, &$value),
            )*
        ];
        $crate::i18n::t_with_args($key, args)
    }};
}
