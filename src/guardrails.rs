//! 内容护栏：禁用词校验与 PII 脱敏
//!
//! 脱敏规则：美国 SSN（123-45-6789）-> `[REDACTED_SSN]`，邮箱 -> `[REDACTED_EMAIL]`。
//! 正则只覆盖常见格式，不是完整的 PII 识别。

use regex::Regex;

use crate::core::error::{OrchestrationError, Result};

const SSN_PATTERN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const EMAIL_PATTERN: &str = r"[\w.-]+@[\w.-]+\.\w+";

/// 默认禁用词（小写）
pub const DEFAULT_BANNED_TERMS: [&str; 2] = ["unethical", "discriminatory"];

#[derive(Debug, Clone)]
pub struct Guardrails {
    ssn: Regex,
    email: Regex,
    banned_terms: Vec<String>,
}

impl Guardrails {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| OrchestrationError::Config(format!("invalid guardrail pattern: {e}")))
        };
        Ok(Self {
            ssn: compile(SSN_PATTERN)?,
            email: compile(EMAIL_PATTERN)?,
            banned_terms: DEFAULT_BANNED_TERMS.iter().map(|t| t.to_string()).collect(),
        })
    }

    /// 替换禁用词列表（统一转小写）
    pub fn with_banned_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.banned_terms = terms.into_iter().map(|t| t.into().to_lowercase()).collect();
        self
    }

    /// 命中的第一个禁用词
    pub fn banned_term<'a>(&'a self, text: &str) -> Option<&'a str> {
        let lower = text.to_lowercase();
        self.banned_terms
            .iter()
            .find(|term| lower.contains(term.as_str()))
            .map(String::as_str)
    }

    /// 不含禁用词（大小写不敏感）时返回 true
    pub fn validate_message(&self, text: &str) -> bool {
        match self.banned_term(text) {
            Some(term) => {
                tracing::error!(term, "Message contains banned term");
                false
            }
            None => true,
        }
    }

    pub fn redact_pii(&self, text: &str) -> String {
        let redacted = self.ssn.replace_all(text, "[REDACTED_SSN]");
        let redacted = self.email.replace_all(&redacted, "[REDACTED_EMAIL]");
        tracing::debug!(redacted = %redacted, "PII redacted");
        redacted.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        "Customer email: test@example.com and SSN: 123-45-6789. This is an unethical action.";

    #[test]
    fn test_validate_message() {
        let guardrails = Guardrails::new().unwrap();
        assert!(!guardrails.validate_message(SAMPLE));
        assert!(!guardrails.validate_message("A DISCRIMINATORY segment"));
        assert!(guardrails.validate_message("Boost eco-friendly skincare email conversions"));
    }

    #[test]
    fn test_redact_pii() {
        let guardrails = Guardrails::new().unwrap();
        assert_eq!(
            guardrails.redact_pii(SAMPLE),
            "Customer email: [REDACTED_EMAIL] and SSN: [REDACTED_SSN]. This is an unethical action."
        );
        assert_eq!(guardrails.redact_pii("order 1234-56-789"), "order 1234-56-789");
    }

    #[test]
    fn test_custom_banned_terms() {
        let guardrails = Guardrails::new().unwrap().with_banned_terms(["Spam"]);
        assert_eq!(guardrails.banned_term("pure spam here"), Some("spam"));
        assert!(guardrails.validate_message("unethical but allowed by this list"));
    }
}
