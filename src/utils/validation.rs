use crate::utils::error::{Result, StorefrontError};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 姓名、Telegram 等短欄位的長度上限
pub const MAX_SHORT_INPUT: usize = 100;
/// 訂單留言的長度上限
pub const MAX_MESSAGE_INPUT: usize = 1000;

pub const PHONE_PREFIX: &str = "+998";
/// "+998 XX XXX XX XX"
pub const FORMATTED_PHONE_LEN: usize = 17;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex pattern"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^\+998\s\d{2}\s\d{3}\s\d{2}\s\d{2}$")
}

fn telegram_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^@[a-zA-Z0-9_]{4,32}$")
}

fn promo_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[a-zA-Z0-9_]{3,50}$")
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(StorefrontError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(StorefrontError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(StorefrontError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(StorefrontError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(StorefrontError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StorefrontError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(StorefrontError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

pub fn is_valid_phone_number(phone: &str) -> bool {
    phone_regex().is_match(phone)
}

pub fn is_valid_telegram_username(username: &str) -> bool {
    telegram_regex().is_match(username)
}

pub fn is_valid_promo_code(code: &str) -> bool {
    !code.trim().is_empty() && promo_regex().is_match(code)
}

/// 去除 HTML 類字元、壓縮空白並截斷長度
pub fn sanitize_input(input: &str, max_len: usize) -> String {
    let stripped: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '`'))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_len).collect()
}

/// 留言保留單一換行，連續空行合併
pub fn sanitize_message(message: &str, max_len: usize) -> String {
    let stripped: String = message
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '`'))
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut newlines = 0;
    for c in stripped.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines == 1 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out.chars().take(max_len).collect()
}

/// 將任意輸入整理成 "+998 XX XXX XX XX"，最多取前綴後 9 位數字
pub fn format_phone_number(input: &str) -> String {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    let local: String = digits
        .strip_prefix("998")
        .unwrap_or(&digits)
        .chars()
        .take(9)
        .collect();

    let mut formatted = PHONE_PREFIX.to_string();
    for (start, end) in [(0, 2), (2, 5), (5, 7), (7, 9)] {
        if local.len() > start {
            formatted.push(' ');
            formatted.push_str(&local[start..end.min(local.len())]);
        }
    }
    formatted
}
