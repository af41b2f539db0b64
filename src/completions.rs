// Lesson completions, kept as a set on the user record. Inserts check
// membership by key equality before appending, so marking the same lesson
// complete twice stores one entry.

use std::collections::BTreeMap;

use serde_json::json;

use crate::error::{StoreError, StoreResult};
use crate::model::CompletionRef;
use crate::store::key::{Key, Kind};
use crate::store::props::{self, Properties};
use crate::store::Datastore;

fn user_key(username: &str) -> Key {
    Key::new(Kind::User, username)
}

/// Record that the user finished a lesson. Idempotent.
pub fn save_completion(
    store: &dyn Datastore,
    username: &str,
    course_code: &str,
    lesson_id: &str,
) -> StoreResult<()> {
    let key = user_key(username);
    let current = store.get(&key)?.ok_or_else(|| StoreError::not_found(&key))?;

    let completion = CompletionRef::new(course_code, lesson_id);
    let mut entries = props::opt_str_list(&current, "completions");
    if entries.iter().any(|entry| entry == &completion.encode()) {
        return Ok(());
    }
    entries.push(completion.encode());

    let mut patch = Properties::new();
    patch.insert("completions".to_string(), json!(entries));
    store.update(&key, &patch)?;

    tracing::info!(
        "recorded completion {}/{} for {}",
        course_code,
        lesson_id,
        username
    );
    Ok(())
}

/// Whether the user already finished this lesson.
pub fn is_complete(
    store: &dyn Datastore,
    username: &str,
    course_code: &str,
    lesson_id: &str,
) -> StoreResult<bool> {
    let encoded = CompletionRef::new(course_code, lesson_id).encode();
    match store.get(&user_key(username))? {
        Some(props) => Ok(props::opt_str_list(&props, "completions")
            .iter()
            .any(|entry| entry == &encoded)),
        None => Ok(false),
    }
}

/// The user's completions grouped by course code, as lexically sorted
/// lesson titles. A completion whose lesson record has since vanished falls
/// back to its raw "course/lesson" reference.
pub fn load_completions(
    store: &dyn Datastore,
    username: &str,
) -> StoreResult<BTreeMap<String, Vec<String>>> {
    let props = match store.get(&user_key(username))? {
        Some(props) => props,
        None => return Ok(BTreeMap::new()),
    };

    let mut by_course: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for raw in props::opt_str_list(&props, "completions") {
        let completion = match CompletionRef::parse(&raw) {
            Some(completion) => completion,
            None => continue,
        };
        let lesson_key = Key::child(
            Kind::Course,
            completion.course_code.clone(),
            Kind::Lesson,
            completion.lesson_id.clone(),
        );
        let label = match store.get(&lesson_key)? {
            Some(lesson_props) => {
                props::opt_str(&lesson_props, "title").unwrap_or_else(|| raw.clone())
            }
            None => raw.clone(),
        };
        by_course
            .entry(completion.course_code)
            .or_default()
            .push(label);
    }

    for titles in by_course.values_mut() {
        titles.sort();
    }
    Ok(by_course)
}
