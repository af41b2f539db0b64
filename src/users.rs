// User accounts. The password hash rides along on save and is only ever
// matched inside filtered queries; it never leaves the store as part of a
// loaded user.

use serde_json::json;

use crate::error::{StoreError, StoreResult};
use crate::model::User;
use crate::posts::{self, FanOut};
use crate::store::key::{Key, Kind};
use crate::store::props::{self, Properties};
use crate::store::query::Query;
use crate::store::Datastore;

/// The profile fields a user can edit after registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub grad_year: i64,
    pub school: String,
    pub photo_url: String,
    pub bio: String,
}

fn user_key(username: &str) -> Key {
    Key::new(Kind::User, username)
}

/// Upsert the user record keyed by username, with the password hash stored
/// alongside the profile fields.
pub fn save_user(store: &dyn Datastore, user: &User, passwordhash: &str) -> StoreResult<()> {
    let mut props = user.to_props();
    props.insert("passwordhash".to_string(), json!(passwordhash));
    store.put(&user_key(&user.username), &props)
}

/// Credential check: the user whose email AND password hash both match, or
/// None. A wrong hash is indistinguishable from an unknown email.
pub fn load_user(
    store: &dyn Datastore,
    email: &str,
    passwordhash: &str,
) -> StoreResult<Option<User>> {
    let rows = store.query(
        &Query::kind(Kind::User)
            .filter("email", email)
            .filter("passwordhash", passwordhash),
    )?;
    match rows.first() {
        Some((_, props)) => Ok(Some(User::from_props(props)?)),
        None => Ok(None),
    }
}

pub fn load_user_by_username(store: &dyn Datastore, username: &str) -> StoreResult<Option<User>> {
    match store.get(&user_key(username))? {
        Some(props) => Ok(Some(User::from_props(&props)?)),
        None => Ok(None),
    }
}

pub fn load_user_by_email(store: &dyn Datastore, email: &str) -> StoreResult<Option<User>> {
    let rows = store.query(&Query::kind(Kind::User).filter("email", email))?;
    match rows.first() {
        Some((_, props)) => Ok(Some(User::from_props(props)?)),
        None => Ok(None),
    }
}

/// The user's bio, or an empty string for an unknown user.
pub fn load_about_user(store: &dyn Datastore, username: &str) -> StoreResult<String> {
    match store.get(&user_key(username))? {
        Some(props) => Ok(props::opt_str(&props, "bio").unwrap_or_default()),
        None => Ok(String::new()),
    }
}

/// Apply a profile edit. When the photo changed, the denormalized
/// `profile_pic` on the user's posts is refreshed; the returned counts
/// report that fan-out (zero when the photo was untouched).
pub fn save_profile(
    store: &dyn Datastore,
    username: &str,
    update: &ProfileUpdate,
) -> StoreResult<FanOut> {
    let key = user_key(username);
    let current = store.get(&key)?.ok_or_else(|| StoreError::not_found(&key))?;
    let old_photo = props::opt_str(&current, "photo_url").unwrap_or_default();

    let mut patch = Properties::new();
    patch.insert("first_name".to_string(), json!(update.first_name));
    patch.insert("last_name".to_string(), json!(update.last_name));
    patch.insert("grad_year".to_string(), json!(update.grad_year));
    patch.insert("school".to_string(), json!(update.school));
    patch.insert("photo_url".to_string(), json!(update.photo_url));
    patch.insert("bio".to_string(), json!(update.bio));
    store.update(&key, &patch)?;

    if update.photo_url != old_photo {
        posts::refresh_profile_pics(store, username, &update.photo_url)
    } else {
        Ok(FanOut {
            attempted: 0,
            updated: 0,
        })
    }
}

/// Change only the photo and fan the new URL out to the user's posts.
pub fn update_user_photo(
    store: &dyn Datastore,
    username: &str,
    photo_url: &str,
) -> StoreResult<FanOut> {
    let mut patch = Properties::new();
    patch.insert("photo_url".to_string(), json!(photo_url));
    store.update(&user_key(username), &patch)?;

    posts::refresh_profile_pics(store, username, photo_url)
}
