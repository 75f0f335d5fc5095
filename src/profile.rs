//! User profiles: display name, a Swedish phone number kept in E.164 form
//! and an avatar stored in one of the avatar buckets.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::storage::split_public_url;

/// Avatar buckets, tried in order on upload.
pub const AVATAR_BUCKETS: [&str; 2] = ["avatars", "AVATARS"];

pub const MAX_AVATAR_BYTES: usize = 8 * 1024 * 1024;

pub const INVALID_PHONE: &str =
    "Ogiltigt svenskt nummer. Exempel: 070-123 45 67 eller +46701234567.";

lazy_static! {
    static ref PHONE_NOISE: Regex = Regex::new(r"[^\d+]").unwrap();
    static ref NON_DIGIT: Regex = Regex::new(r"\D").unwrap();
    static ref AVATAR_TYPE: Regex = Regex::new(r"(?i)^image/(png|jpe?g|webp)$").unwrap();
}

/// A row of the `profiles` table. `id` is the user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Profile {
    /// What a user without a stored profile sees.
    pub fn empty(user_id: &str) -> Profile {
        Profile {
            id: user_id.to_string(),
            full_name: Some(String::new()),
            phone: None,
            avatar_url: None,
            updated_at: None,
        }
    }
}

/// A profile as returned to its owner, with the phone number grouped for
/// display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub phone_display: Option<String>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        let phone_display = profile.phone.as_deref().map(pretty_se);
        ProfileView {
            profile,
            phone_display,
        }
    }
}

/// Normalises a Swedish phone number to `+46` followed by 7 to 10 digits.
///
/// Separators are dropped, a `00` prefix becomes `+` and a leading trunk
/// `0` is replaced by the country code. Numbers in other countries are
/// rejected.
pub fn to_e164_se(input: &str) -> Option<String> {
    let mut s = PHONE_NOISE.replace_all(input.trim(), "").into_owned();
    if s.is_empty() {
        return None;
    }
    if s.starts_with("00") {
        s.replace_range(..2, "+");
    }
    if s.starts_with('0') {
        s.replace_range(..1, "+46");
    }
    if !s.starts_with('+') {
        s.insert_str(0, "+46");
    }

    let digits = NON_DIGIT.replace_all(&s, "");
    let national = digits.strip_prefix("46")?;
    if !(7..=10).contains(&national.len()) {
        return None;
    }
    Some(format!("+{digits}"))
}

/// Groups an E.164 number for display: `+46701234567` is
/// `+46 70 123 45 67`.
pub fn pretty_se(e164: &str) -> String {
    let digits = NON_DIGIT.replace_all(e164, "");
    let mut rest = digits.get(2..).unwrap_or_default();

    let widths: Vec<usize> = match rest.len() {
        9 => vec![2, 3, 2, 2],
        8 => vec![1, 3, 2, 2],
        _ => {
            let mut widths = Vec::new();
            let mut left = rest.len();
            while left > 0 {
                let take = match left {
                    n if n > 7 => 2,
                    n if n > 4 => 3,
                    n if n > 2 => 2,
                    n => n,
                };
                widths.push(take);
                left -= take;
            }
            widths
        }
    };

    let mut groups = Vec::with_capacity(widths.len());
    for width in widths {
        let (group, tail) = rest.split_at(width.min(rest.len()));
        groups.push(group);
        rest = tail;
    }
    format!("+46 {}", groups.join(" "))
}

/// File extension for an accepted avatar content type.
pub fn avatar_extension(content_type: &str) -> Option<&'static str> {
    let captures = AVATAR_TYPE.captures(content_type.trim())?;
    match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
        "png" => Some("png"),
        "webp" => Some("webp"),
        _ => Some("jpg"),
    }
}

/// Bucket and object path of an avatar URL. URLs outside the avatar
/// buckets are not ours to remove.
pub fn avatar_object(url: &str) -> Option<(String, String)> {
    split_public_url(url).filter(|(bucket, _)| AVATAR_BUCKETS.contains(&bucket.as_str()))
}
