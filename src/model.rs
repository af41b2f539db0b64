// Typed entities and their mapping to flat property documents. Mapping is
// explicit field-by-field: a required field that is absent (or of the wrong
// type) fails with MissingField instead of defaulting. The property names
// are the wire contract with any existing stored data.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::StoreResult;
use crate::store::key::Kind;
use crate::store::props::{self, Properties};

/// Display timestamp for posts and comments, e.g.
/// "Tue, August 04, 2026 at 14:03:59". One format, applied only at the
/// creation boundary.
pub const DATE_DISPLAY_FORMAT: &str = "%a, %B %d, %Y at %H:%M:%S";

pub fn display_now() -> String {
    Utc::now().format(DATE_DISPLAY_FORMAT).to_string()
}

/// Machine creation timestamp. Fixed-width RFC 3339 so lexicographic order
/// equals chronological order, which is what "-created" queries sort on.
pub fn created_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A user account. The password hash is never part of the in-memory user;
/// it is supplied separately on save and only ever compared via filtered
/// queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub grad_year: i64,
    pub school: String,
    pub photo_url: String,
    pub bio: String,
    pub completions: Vec<CompletionRef>,
}

impl User {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        grad_year: i64,
        school: impl Into<String>,
        photo_url: impl Into<String>,
        bio: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            grad_year,
            school: school.into(),
            photo_url: photo_url.into(),
            bio: bio.into(),
            completions: Vec::new(),
        }
    }

    pub fn from_props(props: &Properties) -> StoreResult<Self> {
        let kind = Kind::User;
        Ok(Self {
            username: props::req_str(props, kind, "username")?,
            email: props::req_str(props, kind, "email")?,
            first_name: props::req_str(props, kind, "first_name")?,
            last_name: props::req_str(props, kind, "last_name")?,
            grad_year: props::req_i64(props, kind, "grad_year")?,
            school: props::req_str(props, kind, "school")?,
            photo_url: props::req_str(props, kind, "photo_url")?,
            bio: props::req_str(props, kind, "bio")?,
            // Records written before the LMS features predate this field.
            completions: props::opt_str_list(props, "completions")
                .iter()
                .filter_map(|raw| CompletionRef::parse(raw))
                .collect(),
        })
    }

    /// Everything but the password hash; the gateway adds that on save.
    pub fn to_props(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("username".to_string(), json!(self.username));
        props.insert("email".to_string(), json!(self.email));
        props.insert("first_name".to_string(), json!(self.first_name));
        props.insert("last_name".to_string(), json!(self.last_name));
        props.insert("grad_year".to_string(), json!(self.grad_year));
        props.insert("school".to_string(), json!(self.school));
        props.insert("photo_url".to_string(), json!(self.photo_url));
        props.insert("bio".to_string(), json!(self.bio));
        props.insert(
            "completions".to_string(),
            json!(self
                .completions
                .iter()
                .map(CompletionRef::encode)
                .collect::<Vec<String>>()),
        );
        props
    }
}

/// Membership of the (user, course, lesson) completion relation, stored on
/// the user as "course_code/lesson_id".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRef {
    pub course_code: String,
    pub lesson_id: String,
}

impl CompletionRef {
    pub fn new(course_code: impl Into<String>, lesson_id: impl Into<String>) -> Self {
        Self {
            course_code: course_code.into(),
            lesson_id: lesson_id.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}/{}", self.course_code, self.lesson_id)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (course_code, lesson_id) = raw.split_once('/')?;
        if course_code.is_empty() || lesson_id.is_empty() {
            return None;
        }
        Some(Self::new(course_code, lesson_id))
    }
}

/// A marketplace listing. `comments` holds comment IDs in append order;
/// comment bodies live in their own ancestor-keyed records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    pub username: String,
    pub profile_pic: String,
    pub title: String,
    pub description: String,
    pub price: String,
    pub condition: String,
    pub image: String,
    pub comments: Vec<String>,
    pub date: String,
    pub created: String,
}

impl Post {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        post_id: impl Into<String>,
        username: impl Into<String>,
        profile_pic: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        price: impl Into<String>,
        condition: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            username: username.into(),
            profile_pic: profile_pic.into(),
            title: title.into(),
            description: description.into(),
            price: price.into(),
            condition: condition.into(),
            image: image.into(),
            comments: Vec::new(),
            date: display_now(),
            created: created_now(),
        }
    }

    pub fn from_props(props: &Properties) -> StoreResult<Self> {
        let kind = Kind::Post;
        Ok(Self {
            post_id: props::req_str(props, kind, "post_id")?,
            username: props::req_str(props, kind, "username")?,
            profile_pic: props::req_str(props, kind, "profile_pic")?,
            title: props::req_str(props, kind, "title")?,
            description: props::req_str(props, kind, "description")?,
            price: props::req_str(props, kind, "price")?,
            condition: props::req_str(props, kind, "condition")?,
            image: props::req_str(props, kind, "image")?,
            comments: props::req_str_list(props, kind, "comments")?,
            date: props::req_str(props, kind, "date")?,
            created: props::req_str(props, kind, "created")?,
        })
    }

    pub fn to_props(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("post_id".to_string(), json!(self.post_id));
        props.insert("username".to_string(), json!(self.username));
        props.insert("profile_pic".to_string(), json!(self.profile_pic));
        props.insert("title".to_string(), json!(self.title));
        props.insert("description".to_string(), json!(self.description));
        props.insert("price".to_string(), json!(self.price));
        props.insert("condition".to_string(), json!(self.condition));
        props.insert("image".to_string(), json!(self.image));
        props.insert("comments".to_string(), json!(self.comments));
        props.insert("date".to_string(), json!(self.date));
        props.insert("created".to_string(), json!(self.created));
        props
    }
}

/// A comment on a post. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    pub post_id: String,
    pub username: String,
    pub description: String,
    pub date: String,
}

impl Comment {
    pub fn new(
        comment_id: impl Into<String>,
        post_id: impl Into<String>,
        username: impl Into<String>,
        description: impl Into<String>,
        date: Option<String>,
    ) -> Self {
        Self {
            comment_id: comment_id.into(),
            post_id: post_id.into(),
            username: username.into(),
            description: description.into(),
            date: date.unwrap_or_else(display_now),
        }
    }

    pub fn from_props(props: &Properties) -> StoreResult<Self> {
        let kind = Kind::Comment;
        Ok(Self {
            comment_id: props::req_str(props, kind, "comment_id")?,
            post_id: props::req_str(props, kind, "post_id")?,
            username: props::req_str(props, kind, "username")?,
            description: props::req_str(props, kind, "description")?,
            date: props::req_str(props, kind, "date")?,
        })
    }

    pub fn to_props(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("comment_id".to_string(), json!(self.comment_id));
        props.insert("post_id".to_string(), json!(self.post_id));
        props.insert("username".to_string(), json!(self.username));
        props.insert("description".to_string(), json!(self.description));
        props.insert("date".to_string(), json!(self.date));
        props
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub name: String,
    pub description: String,
}

impl Course {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn from_props(props: &Properties) -> StoreResult<Self> {
        let kind = Kind::Course;
        Ok(Self {
            code: props::req_str(props, kind, "code")?,
            name: props::req_str(props, kind, "name")?,
            description: props::req_str(props, kind, "description")?,
        })
    }

    pub fn to_props(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("code".to_string(), json!(self.code));
        props.insert("name".to_string(), json!(self.name));
        props.insert("description".to_string(), json!(self.description));
        props
    }
}

/// One lesson of a course. `content` is empty in summary fetches and for
/// records stored without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Lesson {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn from_props(props: &Properties) -> StoreResult<Self> {
        let kind = Kind::Lesson;
        Ok(Self {
            id: props::req_str(props, kind, "id")?,
            title: props::req_str(props, kind, "title")?,
            content: props::opt_str(props, "content").unwrap_or_default(),
        })
    }

    pub fn to_props(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("id".to_string(), json!(self.id));
        props.insert("title".to_string(), json!(self.title));
        props.insert("content".to_string(), json!(self.content));
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::NaiveDateTime;

    fn sample_user() -> User {
        let mut user = User::new(
            "alice",
            "alice@pitt.edu",
            "Alice",
            "Lidell",
            2026,
            "SCI",
            "https://img.example/alice.png",
            "Hi there.",
        );
        user.completions = vec![CompletionRef::new("CS0011", "intro")];
        user
    }

    #[test]
    fn user_round_trips_through_props() {
        let user = sample_user();
        assert_eq!(User::from_props(&user.to_props()).unwrap(), user);
    }

    #[test]
    fn user_props_never_carry_the_password_hash() {
        assert!(sample_user().to_props().get("passwordhash").is_none());
    }

    #[test]
    fn user_missing_required_field_fails_mapping() {
        let mut props = sample_user().to_props();
        props.remove("email");
        let err = User::from_props(&props).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingField {
                kind: Kind::User,
                field: "email"
            }
        ));
    }

    #[test]
    fn user_without_completions_field_reads_as_empty_set() {
        let mut props = sample_user().to_props();
        props.remove("completions");
        let user = User::from_props(&props).unwrap();
        assert!(user.completions.is_empty());
    }

    #[test]
    fn post_round_trips_through_props() {
        let mut post = Post::new(
            "p1", "alice", "pic.png", "Desk", "A fine desk", "25", "used", "desk.jpg",
        );
        post.comments = vec!["c1".to_string(), "c2".to_string()];
        assert_eq!(Post::from_props(&post.to_props()).unwrap(), post);
    }

    #[test]
    fn post_requires_comments_list() {
        let post = Post::new("p1", "alice", "", "Desk", "", "25", "used", "");
        let mut props = post.to_props();
        props.remove("comments");
        assert!(Post::from_props(&props).is_err());
    }

    #[test]
    fn comment_defaults_date_in_display_format() {
        let comment = Comment::new("c1", "p1", "bob", "nice desk", None);
        assert!(NaiveDateTime::parse_from_str(&comment.date, DATE_DISPLAY_FORMAT).is_ok());
    }

    #[test]
    fn comment_keeps_explicit_date() {
        let comment = Comment::new(
            "c1",
            "p1",
            "bob",
            "nice desk",
            Some("Mon, January 05, 2026 at 09:00:00".to_string()),
        );
        assert_eq!(comment.date, "Mon, January 05, 2026 at 09:00:00");
    }

    #[test]
    fn lesson_content_defaults_to_empty() {
        let lesson = Lesson::new("intro", "Lesson 1", "words");
        let mut props = lesson.to_props();
        props.remove("content");
        let loaded = Lesson::from_props(&props).unwrap();
        assert_eq!(loaded.content, "");
        assert_eq!(loaded.title, "Lesson 1");
    }

    #[test]
    fn course_round_trips_through_props() {
        let course = Course::new("CS0011", "Intro", "First course.");
        assert_eq!(Course::from_props(&course.to_props()).unwrap(), course);
    }

    #[test]
    fn completion_ref_encoding_round_trips() {
        let completion = CompletionRef::new("CS0011", "intro");
        assert_eq!(completion.encode(), "CS0011/intro");
        assert_eq!(CompletionRef::parse("CS0011/intro"), Some(completion));
        assert_eq!(CompletionRef::parse("garbage"), None);
        assert_eq!(CompletionRef::parse("/x"), None);
    }

    #[test]
    fn created_timestamps_sort_lexicographically() {
        let earlier = created_now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = created_now();
        assert!(earlier < later);
        assert_eq!(earlier.len(), later.len());
    }
}
