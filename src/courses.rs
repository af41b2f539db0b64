// Course catalog: courses keyed by their human-readable code, lessons
// ancestor-keyed under their course. Reference data, written in bulk by the
// seeding path and read everywhere else.

use serde::Deserialize;

use crate::error::{StoreError, StoreResult};
use crate::model::{Course, Lesson};
use crate::store::key::{Key, Kind};
use crate::store::query::Query;
use crate::store::Datastore;

/// A course and its lesson list. Lesson `content` is omitted here (empty);
/// fetch the single lesson for the full text.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LessonSeed {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseSeed {
    pub code: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub lessons: Vec<LessonSeed>,
}

/// A catalog to seed, as read from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub courses: Vec<CourseSeed>,
}

impl Catalog {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub courses: usize,
    pub lessons: usize,
}

fn course_key(code: &str) -> Key {
    Key::new(Kind::Course, code)
}

fn lesson_key(course_code: &str, lesson_id: &str) -> Key {
    Key::child(Kind::Course, course_code, Kind::Lesson, lesson_id)
}

pub fn save_course(store: &dyn Datastore, course: &Course) -> StoreResult<()> {
    store.put(&course_key(&course.code), &course.to_props())
}

pub fn save_lesson(store: &dyn Datastore, course_code: &str, lesson: &Lesson) -> StoreResult<()> {
    store.put(&lesson_key(course_code, &lesson.id), &lesson.to_props())
}

/// Every course, ordered by code, without lessons.
pub fn load_courses(store: &dyn Datastore) -> StoreResult<Vec<Course>> {
    let rows = store.query(&Query::kind(Kind::Course).order("code"))?;
    rows.iter().map(|(_, props)| Course::from_props(props)).collect()
}

/// One course with its lesson summaries, title-ordered, content omitted.
pub fn load_course(store: &dyn Datastore, code: &str) -> StoreResult<CourseDetail> {
    let key = course_key(code);
    let props = store.get(&key)?.ok_or_else(|| StoreError::not_found(&key))?;
    let course = Course::from_props(&props)?;

    let rows = store.query(&Query::kind(Kind::Lesson).ancestor(key).order("title"))?;
    let lessons = rows
        .iter()
        .map(|(_, props)| {
            let mut lesson = Lesson::from_props(props)?;
            lesson.content = String::new();
            Ok(lesson)
        })
        .collect::<StoreResult<Vec<Lesson>>>()?;

    tracing::info!("loaded course {} with {} lessons", code, lessons.len());
    Ok(CourseDetail { course, lessons })
}

/// Full lesson detail, content included.
pub fn load_lesson(store: &dyn Datastore, course_code: &str, lesson_id: &str) -> StoreResult<Lesson> {
    let key = lesson_key(course_code, lesson_id);
    let props = store.get(&key)?.ok_or_else(|| StoreError::not_found(&key))?;
    Lesson::from_props(&props)
}

/// Bulk-write a catalog. Puts are upserts, so re-seeding the same catalog
/// leaves one record per course and lesson.
pub fn seed_catalog(store: &dyn Datastore, catalog: &Catalog) -> StoreResult<SeedReport> {
    let mut report = SeedReport {
        courses: 0,
        lessons: 0,
    };
    for seed in &catalog.courses {
        let course = Course::new(
            seed.code.as_str(),
            seed.name.as_str(),
            seed.description.as_str(),
        );
        save_course(store, &course)?;
        report.courses += 1;

        for lesson_seed in &seed.lessons {
            let lesson = Lesson::new(
                lesson_seed.id.as_str(),
                lesson_seed.title.as_str(),
                lesson_seed.content.as_str(),
            );
            save_lesson(store, &seed.code, &lesson)?;
            report.lessons += 1;
        }
    }
    tracing::info!(
        "seeded catalog: {} courses, {} lessons",
        report.courses,
        report.lessons
    );
    Ok(report)
}
