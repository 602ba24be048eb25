//! Heuristic classification of feed items into Epic/Steam promotions.

use super::end_date::{end_of_day, month_from_name, resolve_end_date};
use super::feed::FeedItem;
use super::models::{NewFreeGame, Platform};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

const MAX_DESCRIPTION_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Epic(NewFreeGame),
    Steam(NewFreeGame),
    Other,
}

impl Classified {
    pub fn into_game(self) -> Option<NewFreeGame> {
        match self {
            Classified::Epic(game) | Classified::Steam(game) => Some(game),
            Classified::Other => None,
        }
    }
}

struct Patterns {
    epic_url: Regex,
    epic_url_encoded: Regex,
    steam_app: Regex,
    end_date: Regex,
    title_brackets: Regex,
    title_free_on_store: Regex,
    title_store_suffix: Regex,
    title_free_paren: Regex,
    html_tag: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("classifier pattern must compile");
        Patterns {
            epic_url: re(r#"(?i)https?://store\.epicgames\.com/[^\s"'<>)\]]+"#),
            epic_url_encoded: re(r#"(?i)https?%3A%2F%2Fstore\.epicgames\.com%2F[^\s"'<>&)\]]+"#),
            steam_app: re(r"(?i)store\.steampowered\.com/app/(\d+)"),
            end_date: re(concat!(
                r"(?i)\b(?:until|through|thru)\s+(?:[a-z]+day,?\s+)?",
                r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?",
                r"|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+",
                r"(\d{1,2})(?:st|nd|rd|th)?\b"
            )),
            title_brackets: re(r"(?i)[\(\[]\s*(?:epic(?:\s+games)?(?:\s+store)?|egs|steam)\s*[\)\]]"),
            title_free_on_store: re(concat!(
                r"(?i)\s+(?:is\s+)?(?:currently\s+)?(?:now\s+)?free\s+(?:to\s+keep\s+)?",
                r"(?:from|on|at|in|via)\s+(?:the\s+)?(?:epic\s+games|epic|steam)(?:\s+store)?\b.*$"
            )),
            title_store_suffix: re(r"(?i)\s*[|\-–—]\s*(?:epic|steam)\b.*$"),
            title_free_paren: re(r"(?i)[\(\[][^\)\]]*\b(?:free|until|through)\b[^\)\]]*[\)\]]"),
            html_tag: re(r"<[^>]*>"),
        }
    })
}

/// Decide what a feed item is and extract its persisted fields.
///
/// Epic wins when an Epic domain shows up in the description or link; Steam
/// needs a store link or a title mentioning both Steam and "free", and is
/// dropped when no app id can be found.
pub fn classify(item: &FeedItem, now: DateTime<Utc>) -> Classified {
    let description_lower = item.description.to_ascii_lowercase();
    let link_lower = item.link.to_ascii_lowercase();
    let title_lower = item.title.to_ascii_lowercase();

    if description_lower.contains("epicgames.com") || link_lower.contains("epicgames.com") {
        return classify_epic(item, now).map_or(Classified::Other, Classified::Epic);
    }

    let mentions_steam_store = description_lower.contains("store.steampowered.com")
        || link_lower.contains("store.steampowered.com");
    let steam_free_title = title_lower.contains("steam") && title_lower.contains("free");
    if mentions_steam_store || steam_free_title {
        return classify_steam(item, now).map_or(Classified::Other, Classified::Steam);
    }

    Classified::Other
}

fn classify_epic(item: &FeedItem, now: DateTime<Utc>) -> Option<NewFreeGame> {
    let title = clean_title(&item.title)?;
    let url = extract_epic_url(&item.description).unwrap_or_else(|| item.link.clone());
    if url.is_empty() {
        return None;
    }
    Some(NewFreeGame {
        platform: Platform::Epic,
        title,
        description: clean_description(&item.description),
        url,
        app_id: None,
        start_date: item.pub_date.unwrap_or(now),
        end_date: extract_end_date(item, now),
    })
}

fn classify_steam(item: &FeedItem, now: DateTime<Utc>) -> Option<NewFreeGame> {
    let app_id = extract_steam_app_id(&item.description)?;
    let title = clean_title(&item.title)?;
    Some(NewFreeGame {
        platform: Platform::Steam,
        title,
        description: clean_description(&item.description),
        url: format!("https://store.steampowered.com/app/{app_id}/"),
        app_id: Some(app_id),
        start_date: item.pub_date.unwrap_or(now),
        end_date: extract_end_date(item, now),
    })
}

/// First Epic store URL in `text`, literal or percent-encoded, in decoded form.
pub fn extract_epic_url(text: &str) -> Option<String> {
    let p = patterns();
    if let Some(m) = p.epic_url.find(text) {
        return Some(trim_url(m.as_str()));
    }
    let encoded = p.epic_url_encoded.find(text)?;
    let decoded = urlencoding::decode(encoded.as_str()).ok()?;
    Some(trim_url(&decoded))
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches(['.', ',', ';', '!', '?']).to_string()
}

/// Steam app id from a `store.steampowered.com/app/<id>` URL.
pub fn extract_steam_app_id(text: &str) -> Option<i64> {
    patterns()
        .steam_app
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

/// End timestamp from "until/through <Month> <Day>" in the description, then the title.
pub fn extract_end_date(item: &FeedItem, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let p = patterns();
    [item.description.as_str(), item.title.as_str()]
        .into_iter()
        .find_map(|text| {
            let caps = p.end_date.captures(text)?;
            let month = month_from_name(caps.get(1)?.as_str())?;
            let day = caps.get(2)?.as_str().parse::<u32>().ok()?;
            resolve_end_date(month, day, now.date_naive())
        })
        .map(end_of_day)
}

/// Strip storefront decorations from a feed title. `None` when nothing is left.
pub fn clean_title(raw: &str) -> Option<String> {
    let p = patterns();
    let mut title = p.title_brackets.replace_all(raw, " ").into_owned();
    title = p.title_free_paren.replace_all(&title, " ").into_owned();
    title = p.title_free_on_store.replace(&title, "").into_owned();
    title = p.title_store_suffix.replace(&title, "").into_owned();

    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | '|' | ':' | ','))
        .to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Plain-text description: tags removed, whitespace collapsed, length capped.
pub fn clean_description(raw: &str) -> Option<String> {
    let without_tags = patterns().html_tag.replace_all(raw, " ");
    let text = without_tags
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().count() <= MAX_DESCRIPTION_CHARS {
        return Some(collapsed);
    }
    let mut truncated: String = collapsed.chars().take(MAX_DESCRIPTION_CHARS - 1).collect();
    truncated.push('…');
    Some(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn item(title: &str, description: &str, link: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            description: description.to_string(),
            link: link.to_string(),
            pub_date: None,
        }
    }

    #[test]
    fn steam_example_is_classified_with_app_id_and_clean_title() {
        let it = item(
            "Cool Game free in the steam store",
            "Get it here: https://store.steampowered.com/app/123456/CoolGame",
            "https://example.com/post/1",
        );
        let Classified::Steam(game) = classify(&it, now()) else {
            panic!("expected steam classification");
        };
        assert_eq!(game.platform, Platform::Steam);
        assert_eq!(game.app_id, Some(123456));
        assert_eq!(game.title, "Cool Game");
        assert_eq!(game.url, "https://store.steampowered.com/app/123456/");
        assert_eq!(game.end_date, None);
        assert!(!game.is_expired_at(now()));
        assert_eq!(game.start_date, now());
    }

    #[test]
    fn steam_item_without_app_link_is_dropped() {
        let it = item(
            "Another Game free on Steam",
            "Head over to the Steam store, search for it",
            "https://example.com/post/2",
        );
        assert_eq!(classify(&it, now()), Classified::Other);

        let bundle = item(
            "Bundle free on Steam",
            "https://store.steampowered.com/sub/999/",
            "https://example.com/post/3",
        );
        assert_eq!(classify(&bundle, now()), Classified::Other);
    }

    #[test]
    fn epic_literal_url_beats_item_link() {
        let it = item(
            "Mystery Game (Epic Games)",
            r#"<p>Claim at <a href="https://store.epicgames.com/en-US/p/mystery-game">EGS</a> until October 22</p>"#,
            "https://example.com/post/4",
        );
        let Classified::Epic(game) = classify(&it, now()) else {
            panic!("expected epic classification");
        };
        assert_eq!(game.url, "https://store.epicgames.com/en-US/p/mystery-game");
        assert_eq!(game.title, "Mystery Game");
        assert_eq!(
            game.end_date.map(|d| d.to_rfc3339()),
            Some("2026-10-22T23:59:59+00:00".to_string())
        );
        assert_eq!(
            game.description.as_deref(),
            Some("Claim at EGS until October 22")
        );
    }

    #[test]
    fn epic_percent_encoded_url_is_decoded() {
        let it = item(
            "Puzzle Quest free from Epic Games store",
            "https://out.reddit.com/t3_x?url=https%3A%2F%2Fstore.epicgames.com%2Fen-US%2Fp%2Fpuzzle-quest&token=abc",
            "https://example.com/post/5",
        );
        let Classified::Epic(game) = classify(&it, now()) else {
            panic!("expected epic classification");
        };
        assert_eq!(game.url, "https://store.epicgames.com/en-US/p/puzzle-quest");
        assert_eq!(game.title, "Puzzle Quest");
    }

    #[test]
    fn epic_falls_back_to_link_when_description_has_no_store_url() {
        let it = item(
            "Space Sim | Epic Games Store",
            "Free this week",
            "https://store.epicgames.com/en-US/free-games",
        );
        let game = classify(&it, now()).into_game().unwrap();
        assert_eq!(game.platform, Platform::Epic);
        assert_eq!(game.url, "https://store.epicgames.com/en-US/free-games");
        assert_eq!(game.title, "Space Sim");
    }

    #[test]
    fn epic_detection_wins_over_steam_mentions() {
        let it = item(
            "Dual Release free on Steam",
            "Also on store.epicgames.com/p/dual and store.steampowered.com/app/42",
            "https://example.com/post/6",
        );
        assert!(matches!(classify(&it, now()), Classified::Epic(_)));
    }

    #[test]
    fn unrelated_items_are_other() {
        let it = item(
            "Weekly deals roundup",
            "Discounts on GOG and Humble",
            "https://example.com/post/7",
        );
        assert_eq!(classify(&it, now()), Classified::Other);
    }

    #[test]
    fn past_end_date_marks_game_expired() {
        let it = item(
            "Old Promo (Epic Games)",
            "Was free through September 1st on https://store.epicgames.com/p/old-promo",
            "",
        );
        let game = classify(&it, now()).into_game().unwrap();
        assert_eq!(
            game.end_date.map(|d| d.date_naive().to_string()),
            Some("2026-09-01".to_string())
        );
        assert!(game.is_expired_at(now()));
    }

    #[test]
    fn end_date_read_from_title_with_weekday() {
        let it = item(
            "Racer X free on Steam until Thursday, Jan 7th",
            "https://store.steampowered.com/app/777/RacerX/",
            "",
        );
        let game = classify(&it, now()).into_game().unwrap();
        assert_eq!(game.title, "Racer X");
        assert_eq!(
            game.end_date.map(|d| d.date_naive().to_string()),
            Some("2027-01-07".to_string())
        );
    }

    #[test]
    fn title_cleaning_variants() {
        assert_eq!(clean_title("[Epic Games] Hero Saga").as_deref(), Some("Hero Saga"));
        assert_eq!(
            clean_title("Hero Saga (Free until Oct 30)").as_deref(),
            Some("Hero Saga")
        );
        assert_eq!(
            clean_title("Hero Saga is currently free on the Epic Games Store!").as_deref(),
            Some("Hero Saga")
        );
        assert_eq!(
            clean_title("Half-Life: Alyx - Steam").as_deref(),
            Some("Half-Life: Alyx")
        );
        assert_eq!(clean_title("Steampunk Tales").as_deref(), Some("Steampunk Tales"));
        assert_eq!(clean_title("(Steam)"), None);
    }

    #[test]
    fn description_is_truncated() {
        let long = "a".repeat(MAX_DESCRIPTION_CHARS + 50);
        let cleaned = clean_description(&long).unwrap();
        assert_eq!(cleaned.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(cleaned.ends_with('…'));
        assert_eq!(clean_description("<br/>  "), None);
    }
}
