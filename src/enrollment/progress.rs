//! Progress aggregation over an explicit snapshot of loaded records.
//!
//! Everything here is a pure function of the rows handed in; there is no
//! database access. The store layer loads an enrollment, its course's
//! lessons, and the matching progress rows, runs these functions, and
//! persists whatever changed in the same transaction.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::lesson::Lesson;
use crate::enrollment::{Enrollment, LessonProgress};
use crate::error::{Error, Result};
use crate::utils::now_utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LessonStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Watch state of a single progress row. `NotStarted -> InProgress` on the
/// first positive watch, `InProgress -> Completed` only via
/// [`mark_lesson_complete`]; completion is never revoked.
pub fn lesson_status(progress: &LessonProgress) -> LessonStatus {
    if progress.completed {
        LessonStatus::Completed
    } else if progress.watched_duration > 0 {
        LessonStatus::InProgress
    } else {
        LessonStatus::NotStarted
    }
}

/// An enrollment with the course's lessons and the progress rows that exist
/// for it. Lessons are kept sorted by their order field.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub enrollment: Enrollment,
    pub lessons: Vec<Lesson>,
    pub progress: Vec<LessonProgress>,
}

impl ProgressSnapshot {
    pub fn new(
        enrollment: Enrollment,
        mut lessons: Vec<Lesson>,
        progress: Vec<LessonProgress>,
    ) -> Self {
        lessons.sort_by_key(|l| l.order);
        Self {
            enrollment,
            lessons,
            progress,
        }
    }

    pub fn progress_for(&self, lesson_id: i64) -> Option<&LessonProgress> {
        self.progress.iter().find(|p| p.lesson_id == lesson_id)
    }

    fn is_lesson_completed(&self, lesson_id: i64) -> bool {
        self.progress_for(lesson_id).is_some_and(|p| p.completed)
    }

    pub fn completed_lessons(&self) -> i64 {
        self.lessons
            .iter()
            .filter(|l| self.is_lesson_completed(l.id))
            .count() as i64
    }

    /// Completed lessons over total lessons, as 0-100 rounded to two
    /// decimals. A course without lessons counts as 0.
    pub fn completion_percentage(&self) -> f64 {
        if self.lessons.is_empty() {
            return 0.0;
        }
        round2(self.completed_lessons() as f64 / self.lessons.len() as f64 * 100.0)
    }

    /// Sum of watched minutes across all progress rows.
    pub fn total_watched_minutes(&self) -> i64 {
        self.progress.iter().map(|p| p.watched_duration).sum()
    }

    /// First lesson by ascending order without a completed progress row;
    /// `None` when every lesson is done or the course has no lessons.
    pub fn next_incomplete_lesson(&self) -> Option<&Lesson> {
        self.lessons
            .iter()
            .find(|l| !self.is_lesson_completed(l.id))
    }

    /// True only for a non-empty course with every lesson completed.
    pub fn all_lessons_completed(&self) -> bool {
        !self.lessons.is_empty() && self.next_incomplete_lesson().is_none()
    }
}

/// Watched share of one lesson as 0-100, capped at 100. A zero-duration
/// lesson reads as 100 once completed and 0 before.
pub fn lesson_progress_percentage(progress: &LessonProgress, lesson: &Lesson) -> f64 {
    if lesson.duration == 0 {
        return if progress.completed { 100.0 } else { 0.0 };
    }
    let percentage = progress.watched_duration as f64 / lesson.duration as f64 * 100.0;
    round2(percentage).min(100.0)
}

/// Add `minutes` of watch time. The total is clamped at the lesson duration
/// (the one documented place where input is clamped rather than rejected),
/// so repeated calls past the cap are no-ops. Negative input is rejected.
pub fn record_watch(progress: &mut LessonProgress, lesson: &Lesson, minutes: i64) -> Result<()> {
    if minutes < 0 {
        return Err(Error::validation("watched minutes must not be negative"));
    }
    progress.watched_duration = progress
        .watched_duration
        .saturating_add(minutes)
        .min(lesson.duration);
    progress.last_watched_at = Some(now_utc());
    Ok(())
}

/// Overwrite the watched duration with an absolute value, for clients that
/// report player position instead of deltas. Unlike [`record_watch`] this
/// rejects values beyond the lesson duration to surface client bugs.
pub fn set_watched_duration(
    progress: &mut LessonProgress,
    lesson: &Lesson,
    minutes: i64,
) -> Result<()> {
    if minutes < 0 {
        return Err(Error::validation("watched minutes must not be negative"));
    }
    if minutes > lesson.duration {
        return Err(Error::validation(format!(
            "watched duration {} exceeds lesson duration {}",
            minutes, lesson.duration
        )));
    }
    progress.watched_duration = minutes;
    progress.last_watched_at = Some(now_utc());
    Ok(())
}

/// Mark one lesson done: completion flag, timestamp, and the watched
/// duration forced to the full lesson length. Idempotent.
pub fn mark_lesson_complete(progress: &mut LessonProgress, lesson: &Lesson) {
    if progress.completed {
        return;
    }
    progress.completed = true;
    progress.completed_at = Some(now_utc());
    progress.watched_duration = lesson.duration;
}

/// Mark the whole enrollment done. Deliberately not triggered from
/// [`mark_lesson_complete`]: the caller decides when all lessons are done
/// and invokes this explicitly after the last one.
pub fn mark_enrollment_complete(enrollment: &mut Enrollment) {
    if enrollment.completed {
        return;
    }
    enrollment.completed = true;
    enrollment.completed_at = Some(now_utc());
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: i64, order: i64, duration: i64) -> Lesson {
        Lesson {
            id,
            course_id: 1,
            video_id: id,
            title: format!("Lesson {order}"),
            description: String::new(),
            order,
            is_free_preview: false,
            duration,
            created_at: now_utc(),
            updated_at: now_utc(),
        }
    }

    fn fresh_progress(lesson_id: i64) -> LessonProgress {
        LessonProgress {
            id: lesson_id,
            enrollment_id: 1,
            lesson_id,
            completed: false,
            completed_at: None,
            watched_duration: 0,
            last_watched_at: None,
            created_at: now_utc(),
            updated_at: now_utc(),
        }
    }

    fn enrollment() -> Enrollment {
        Enrollment {
            id: 1,
            user_id: 1,
            course_id: 1,
            enrolled_at: now_utc(),
            is_active: true,
            completed: false,
            completed_at: None,
            certificate_issued: false,
            rating: None,
            review: String::new(),
            created_at: now_utc(),
            updated_at: now_utc(),
        }
    }

    #[test]
    fn empty_course_has_zero_percentage() {
        let snapshot = ProgressSnapshot::new(enrollment(), vec![], vec![]);
        assert_eq!(snapshot.completion_percentage(), 0.0);
        assert_eq!(snapshot.total_watched_minutes(), 0);
        assert!(snapshot.next_incomplete_lesson().is_none());
        assert!(!snapshot.all_lessons_completed());
    }

    #[test]
    fn partial_completion_aggregates() {
        // Lessons [1,2,3] with durations [10,20,30]: lesson 1 fully done,
        // lesson 2 watched for 5 minutes.
        let lessons = vec![lesson(1, 1, 10), lesson(2, 2, 20), lesson(3, 3, 30)];
        let mut p1 = fresh_progress(1);
        mark_lesson_complete(&mut p1, &lessons[0]);
        let mut p2 = fresh_progress(2);
        record_watch(&mut p2, &lessons[1], 5).unwrap();
        let snapshot = ProgressSnapshot::new(enrollment(), lessons, vec![p1, p2]);
        assert_eq!(snapshot.completion_percentage(), 33.33);
        assert_eq!(snapshot.total_watched_minutes(), 15);
        assert_eq!(snapshot.next_incomplete_lesson().unwrap().id, 2);
    }

    #[test]
    fn record_watch_clamps_at_duration() {
        let l = lesson(1, 1, 20);
        let mut p = fresh_progress(1);
        record_watch(&mut p, &l, 25).unwrap();
        assert_eq!(p.watched_duration, 20);
        // idempotent at the ceiling
        record_watch(&mut p, &l, 5).unwrap();
        assert_eq!(p.watched_duration, 20);
        assert!(p.last_watched_at.is_some());
    }

    #[test]
    fn record_watch_is_monotonic() {
        let l = lesson(1, 1, 30);
        let mut p = fresh_progress(1);
        let mut previous = 0;
        for minutes in [0, 3, 7, 12, 40] {
            record_watch(&mut p, &l, minutes).unwrap();
            assert!(p.watched_duration >= previous);
            assert!(p.watched_duration <= l.duration);
            previous = p.watched_duration;
        }
    }

    #[test]
    fn record_watch_survives_huge_minutes() {
        let l = lesson(1, 1, 20);
        let mut p = fresh_progress(1);
        record_watch(&mut p, &l, 5).unwrap();
        record_watch(&mut p, &l, i64::MAX).unwrap();
        assert_eq!(p.watched_duration, 20);
    }

    #[test]
    fn record_watch_rejects_negative_minutes() {
        let l = lesson(1, 1, 10);
        let mut p = fresh_progress(1);
        assert!(matches!(
            record_watch(&mut p, &l, -1),
            Err(Error::Validation(_))
        ));
        assert_eq!(p.watched_duration, 0);
    }

    #[test]
    fn set_watched_duration_rejects_overshoot() {
        let l = lesson(1, 1, 20);
        let mut p = fresh_progress(1);
        assert!(matches!(
            set_watched_duration(&mut p, &l, 21),
            Err(Error::Validation(_))
        ));
        assert_eq!(p.watched_duration, 0);
        set_watched_duration(&mut p, &l, 20).unwrap();
        assert_eq!(p.watched_duration, 20);
    }

    #[test]
    fn status_transitions() {
        let l = lesson(1, 1, 10);
        let mut p = fresh_progress(1);
        assert_eq!(lesson_status(&p), LessonStatus::NotStarted);
        record_watch(&mut p, &l, 0).unwrap();
        assert_eq!(lesson_status(&p), LessonStatus::NotStarted);
        record_watch(&mut p, &l, 4).unwrap();
        assert_eq!(lesson_status(&p), LessonStatus::InProgress);
        mark_lesson_complete(&mut p, &l);
        assert_eq!(lesson_status(&p), LessonStatus::Completed);
    }

    #[test]
    fn mark_lesson_complete_is_idempotent() {
        let l = lesson(1, 1, 10);
        let mut p = fresh_progress(1);
        mark_lesson_complete(&mut p, &l);
        let first_completed_at = p.completed_at;
        let first = p.clone();
        mark_lesson_complete(&mut p, &l);
        assert_eq!(p.completed, first.completed);
        assert_eq!(p.watched_duration, first.watched_duration);
        assert_eq!(p.completed_at, first_completed_at);
    }

    #[test]
    fn completion_invariant_holds_after_complete() {
        let l = lesson(1, 1, 45);
        let mut p = fresh_progress(1);
        record_watch(&mut p, &l, 10).unwrap();
        mark_lesson_complete(&mut p, &l);
        assert_eq!(p.watched_duration, l.duration);
        assert!(p.completed_at.is_some());
        // further watch calls cannot push past the duration
        record_watch(&mut p, &l, 100).unwrap();
        assert_eq!(p.watched_duration, l.duration);
    }

    #[test]
    fn next_incomplete_skips_completed_only() {
        let lessons = vec![lesson(1, 1, 10), lesson(2, 2, 10), lesson(3, 3, 10)];
        let mut progress = Vec::new();
        for l in &lessons {
            let mut p = fresh_progress(l.id);
            mark_lesson_complete(&mut p, l);
            progress.push(p);
        }
        let snapshot = ProgressSnapshot::new(enrollment(), lessons.clone(), progress.clone());
        assert!(snapshot.next_incomplete_lesson().is_none());
        assert!(snapshot.all_lessons_completed());
        assert_eq!(snapshot.completion_percentage(), 100.0);

        // un-complete the middle lesson: it becomes the next one even
        // though a later lesson is done
        progress[1].completed = false;
        let snapshot = ProgressSnapshot::new(enrollment(), lessons, progress);
        assert_eq!(snapshot.next_incomplete_lesson().unwrap().id, 2);
        assert!(!snapshot.all_lessons_completed());
    }

    #[test]
    fn zero_duration_lesson_percentage() {
        let l = lesson(1, 1, 0);
        let mut p = fresh_progress(1);
        assert_eq!(lesson_progress_percentage(&p, &l), 0.0);
        mark_lesson_complete(&mut p, &l);
        assert_eq!(lesson_progress_percentage(&p, &l), 100.0);
    }

    #[test]
    fn lesson_percentage_caps_and_rounds() {
        let l = lesson(1, 1, 3);
        let mut p = fresh_progress(1);
        record_watch(&mut p, &l, 1).unwrap();
        assert_eq!(lesson_progress_percentage(&p, &l), 33.33);
        record_watch(&mut p, &l, 10).unwrap();
        assert_eq!(lesson_progress_percentage(&p, &l), 100.0);
    }

    #[test]
    fn mark_enrollment_complete_is_explicit_and_idempotent() {
        let mut e = enrollment();
        mark_enrollment_complete(&mut e);
        assert!(e.completed);
        let first_completed_at = e.completed_at;
        mark_enrollment_complete(&mut e);
        assert_eq!(e.completed_at, first_completed_at);
    }
}
