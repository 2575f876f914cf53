//! Giveaway draw.
//!
//! A draw selects winners among the entries collected from a single social media post.
//! Its [`Status`] only moves forward through the transitions described in the
//! [`lifecycle`](crate::lifecycle) module, and draws are never hard-deleted.

use rand::{
    distributions::{Alphanumeric, DistString},
    thread_rng, Rng,
};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Alphabet used for fairness codes, without characters that are easy to confuse.
const DRAW_CODE_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Fairness code length, without the separator.
pub const DRAW_CODE_LENGTH: usize = 8;

/// Max length of the title-derived part of a public view slug.
pub const SLUG_TITLE_LENGTH: usize = 40;

/// Length of the random public view slug suffix.
pub const SLUG_SUFFIX_LENGTH: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "draws")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub platform: Platform,
    pub title: String,
    pub status: Status,
    pub winners_count: i32,
    pub alternates_count: i32,
    pub draw_mode: DrawMode,
    pub answer_match: AnswerMatch,
    pub correct_answer: Option<String>,
    pub locked_at: Option<TimeDateTime>,
    pub draw_code: Option<String>,
    #[sea_orm(unique)]
    pub public_view_slug: Option<String>,
    pub show_logo: bool,
    pub show_contest_image: bool,
    pub video_format: VideoFormat,
    pub audit_seed: Option<String>,
    pub audit_hash_before: Option<String>,
    pub audit_hash_after: Option<String>,
    pub drawn_at: Option<TimeDateTime>,
    pub created_at: TimeDateTime,
}

impl Model {
    /// Check if draw inputs (source, counts, mode, entries) may still be changed.
    pub fn is_editable(&self) -> bool {
        self.status == Status::Draft && self.locked_at.is_none()
    }

    /// Amount of winners and alternates picked by a single draw invocation.
    pub fn pick_counts(&self) -> (usize, usize) {
        (
            self.winners_count.max(0) as usize,
            self.alternates_count.max(0) as usize,
        )
    }
}

/// Social media platform entries are collected from.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    #[sea_orm(num_value = 0)]
    Facebook,
    #[sea_orm(num_value = 1)]
    Instagram,
    #[sea_orm(num_value = 2)]
    Tiktok,
}

/// Draw lifecycle status.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(num_value = 0)]
    Draft,
    #[sea_orm(num_value = 1)]
    Frozen,
    #[sea_orm(num_value = 2)]
    Drawn,
    #[sea_orm(num_value = 3)]
    Published,
}

/// Selection population mode.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawMode {
    /// Every eligible entry takes part.
    #[sea_orm(num_value = 0)]
    RandomAll,

    /// Only eligible entries with a correct answer take part.
    #[sea_orm(num_value = 1)]
    RandomCorrect,
}

/// Policy used to compute entry correctness against the draw's correct answer.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerMatch {
    /// Case and whitespace insensitive equality.
    #[sea_orm(num_value = 0)]
    Exact,

    /// Case insensitive substring match.
    #[sea_orm(num_value = 1)]
    Contains,
}

impl AnswerMatch {
    /// Check if the provided entry content matches the expected answer.
    pub fn matches(&self, expected: &str, content: &str) -> bool {
        let normalize = |value: &str| {
            value
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        };

        let expected = normalize(expected);

        if expected.is_empty() {
            return false;
        }

        match self {
            AnswerMatch::Exact => normalize(content) == expected,
            AnswerMatch::Contains => normalize(content).contains(&expected),
        }
    }
}

/// Aspect ratio of the rendered result video.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoFormat {
    #[sea_orm(num_value = 0)]
    Vertical,
    #[sea_orm(num_value = 1)]
    Square,
    #[sea_orm(num_value = 2)]
    Landscape,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::source_binding::Entity")]
    SourceBinding,

    #[sea_orm(has_many = "super::entry::Entity")]
    Entries,

    #[sea_orm(has_many = "super::winner::Entity")]
    Winners,

    #[sea_orm(has_one = "super::publish_asset::Entity")]
    PublishAsset,
}

impl Related<super::source_binding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SourceBinding.def()
    }
}

impl Related<super::entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl Related<super::winner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Winners.def()
    }
}

impl Related<super::publish_asset::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PublishAsset.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Generate a new fairness code, formatted as `XXXX-XXXX`.
///
/// The code is a display label, it is not derived from the selection.
///
/// ## Example
///
/// ```
/// use db::draw::generate_draw_code;
///
/// let code = generate_draw_code();
/// assert_eq!(code.len(), 9);
/// assert_eq!(&code[4..5], "-");
/// ```
pub fn generate_draw_code() -> String {
    let mut rng = thread_rng();

    let code: String = (0..DRAW_CODE_LENGTH)
        .map(|_| DRAW_CODE_ALPHABET[rng.gen_range(0..DRAW_CODE_ALPHABET.len())])
        .collect();

    format!(
        "{}-{}",
        &code[..DRAW_CODE_LENGTH / 2],
        &code[DRAW_CODE_LENGTH / 2..]
    )
}

/// Generate a public view slug from the draw title.
///
/// ## Example
///
/// ```
/// use db::draw::generate_slug;
///
/// let slug = generate_slug("Summer Giveaway!");
/// assert!(slug.starts_with("summer-giveaway-"));
/// ```
pub fn generate_slug(title: &str) -> String {
    let mut base = String::with_capacity(SLUG_TITLE_LENGTH);

    for word in title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        if base.len() + word.len() + 1 > SLUG_TITLE_LENGTH {
            break;
        }

        if !base.is_empty() {
            base.push('-');
        }

        base.push_str(&word.to_ascii_lowercase());
    }

    if base.is_empty() {
        base.push_str("draw");
    }

    let suffix = Alphanumeric
        .sample_string(&mut thread_rng(), SLUG_SUFFIX_LENGTH)
        .to_ascii_lowercase();

    format!("{base}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_code_alphabet() {
        for _ in 0..32 {
            let code = generate_draw_code();

            assert_eq!(code.len(), DRAW_CODE_LENGTH + 1);
            assert!(code
                .chars()
                .filter(|c| *c != '-')
                .all(|c| DRAW_CODE_ALPHABET.contains(&c)));
        }
    }

    #[test]
    fn slug_from_title() {
        let slug = generate_slug("  Win a NEW phone -- 2024 edition ");
        assert!(slug.starts_with("win-a-new-phone-2024-edition-"));
        assert_eq!(
            slug.len(),
            "win-a-new-phone-2024-edition-".len() + SLUG_SUFFIX_LENGTH
        );
    }

    #[test]
    fn slug_without_ascii_title() {
        let slug = generate_slug("مسابقة");
        assert!(slug.starts_with("draw-"));
    }

    #[test]
    fn slug_length_limit() {
        let slug = generate_slug(&"giveaway ".repeat(20));
        assert!(slug.len() <= SLUG_TITLE_LENGTH + 1 + SLUG_SUFFIX_LENGTH);
    }

    #[test]
    fn pick_counts() {
        let model = Model {
            id: 1,
            platform: Platform::Facebook,
            title: String::from("Giveaway"),
            status: Status::Frozen,
            winners_count: 3,
            alternates_count: -1,
            draw_mode: DrawMode::RandomAll,
            answer_match: AnswerMatch::Exact,
            correct_answer: None,
            locked_at: None,
            draw_code: None,
            public_view_slug: None,
            show_logo: true,
            show_contest_image: true,
            video_format: VideoFormat::Vertical,
            audit_seed: None,
            audit_hash_before: None,
            audit_hash_after: None,
            drawn_at: None,
            created_at: crate::now(),
        };

        assert_eq!(model.pick_counts(), (3, 0));
    }

    #[test]
    fn answer_matching() {
        assert!(AnswerMatch::Exact.matches("Paris", "  paris "));
        assert!(!AnswerMatch::Exact.matches("Paris", "it's paris"));
        assert!(AnswerMatch::Contains.matches("Paris", "I think it's PARIS!"));
        assert!(AnswerMatch::Exact.matches("New   York", "new york"));
        assert!(!AnswerMatch::Contains.matches("", "anything"));
    }
}
