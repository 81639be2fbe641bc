const COUNTRY_CODE: &str = "55";

/// Digits-only form of `raw`, with the country code prefixed when the number
/// looks like a local one (area code + subscriber, 10 or 11 digits).
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = matches!(digits.len(), 10 | 11) && !digits.starts_with('0');
    if local {
        format!("{}{}", COUNTRY_CODE, digits)
    } else {
        digits
    }
}

/// Phone part of a gateway chat id such as `5511987654321@s.whatsapp.net`.
pub fn phone_from_jid(jid: &str) -> String {
    let user = jid.split('@').next().unwrap_or(jid);
    // multi-device ids look like `5511987654321:12@s.whatsapp.net`
    let user = user.split(':').next().unwrap_or(user);
    user.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with("@g.us")
}

pub fn is_broadcast_jid(jid: &str) -> bool {
    jid == "status@broadcast" || jid.ends_with("@broadcast")
}
