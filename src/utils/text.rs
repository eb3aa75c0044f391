//! Text helpers: HTML escaping, mentions and greeting fillings.

use teloxide::types::User;

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Build an HTML mention link for a user.
pub fn mention_html(user_id: u64, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user_id,
        html_escape(name)
    )
}

/// Apply greeting fillings (placeholders) to a template.
///
/// Fillings:
/// - `{first}` - First name
/// - `{last}` - Last name (falls back to first name)
/// - `{fullname}` - Full name
/// - `{username}` - @username or a mention if the user has none
/// - `{mention}` - Mention with first name
/// - `{id}` - User ID
/// - `{chatname}` - Chat title
/// - `{count}` - Member count (if known)
pub fn fill_greeting(template: &str, user: &User, chat_title: &str, count: Option<u32>) -> String {
    let first = &user.first_name;
    let last = user.last_name.as_deref().unwrap_or(first);
    let fullname = match user.last_name.as_deref() {
        Some(l) => format!("{} {}", first, l),
        None => first.clone(),
    };
    let mention = mention_html(user.id.0, first);
    let username = user
        .username
        .as_ref()
        .map(|u| format!("@{}", u))
        .unwrap_or_else(|| mention.clone());
    let count_str = count.map(|c| c.to_string()).unwrap_or_default();

    template
        .replace("{first}", &html_escape(first))
        .replace("{last}", &html_escape(last))
        .replace("{fullname}", &html_escape(&fullname))
        .replace("{username}", &username)
        .replace("{mention}", &mention)
        .replace("{id}", &user.id.to_string())
        .replace("{chatname}", &html_escape(chat_title))
        .replace("{count}", &count_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId;

    fn sample_user() -> User {
        User {
            id: UserId(42),
            is_bot: false,
            first_name: "Ada".to_string(),
            last_name: None,
            username: None,
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&c"), "a&lt;b&gt;&amp;c");
    }

    #[test]
    fn test_fill_greeting_basic() {
        let user = sample_user();
        let out = fill_greeting("Hi {first}, welcome to {chatname}!", &user, "Rust Chat", None);
        assert_eq!(out, "Hi Ada, welcome to Rust Chat!");
    }

    #[test]
    fn test_fill_greeting_username_falls_back_to_mention() {
        let user = sample_user();
        let out = fill_greeting("{username}", &user, "c", None);
        assert!(out.contains("tg://user?id=42"));
    }

    #[test]
    fn test_fill_greeting_count() {
        let user = sample_user();
        let out = fill_greeting("member #{count}", &user, "c", Some(120));
        assert_eq!(out, "member #120");
    }
}
