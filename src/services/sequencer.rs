// src/services/sequencer.rs

//! Transactional position maintenance for questions and options.
//!
//! Every primitive here runs on a connection that already holds an open
//! transaction. The parent row is locked `FOR NO KEY UPDATE` first, then all
//! sibling rows, so structural changes to the same parent serialize. Ids are
//! never changed here, so the `FOR KEY SHARE` locks taken by foreign-key
//! checks (inserting attempts and their answers) are not blocked. Renumbering is
//! planned by [`SiblingSet`] and written with a single `UNNEST` update; the
//! `(parent, position)` unique constraints are deferred to commit.

use sqlx::PgConnection;

use crate::error::AppError;
use crate::services::ordering::{Reposition, SiblingSet, Slot, normalize_position};

/// Which sibling set a primitive operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingKind {
    /// Questions ordered within an exam.
    Question,
    /// Answer options ordered within a question.
    Option,
}

impl SiblingKind {
    fn table(self) -> &'static str {
        match self {
            SiblingKind::Question => "questions",
            SiblingKind::Option => "answer_options",
        }
    }

    fn parent_table(self) -> &'static str {
        match self {
            SiblingKind::Question => "exams",
            SiblingKind::Option => "questions",
        }
    }

    fn parent_column(self) -> &'static str {
        match self {
            SiblingKind::Question => "exam_id",
            SiblingKind::Option => "question_id",
        }
    }

    fn label(self) -> &'static str {
        match self {
            SiblingKind::Question => "Question",
            SiblingKind::Option => "Option",
        }
    }

    fn parent_label(self) -> &'static str {
        match self {
            SiblingKind::Question => "Exam",
            SiblingKind::Option => "Question",
        }
    }
}

/// Current parent and position of an existing child.
#[derive(Debug, Clone, Copy)]
struct Located {
    parent_id: i64,
    position: i32,
}

fn moved_concurrently(kind: SiblingKind, child_id: i64) -> AppError {
    AppError::Conflict(format!(
        "{} {} was changed by another request, please retry",
        kind.label(),
        child_id
    ))
}

async fn locate(
    conn: &mut PgConnection,
    kind: SiblingKind,
    child_id: i64,
) -> Result<Located, AppError> {
    let sql = format!(
        "SELECT {}, position FROM {} WHERE id = $1",
        kind.parent_column(),
        kind.table()
    );
    let (parent_id, position) = sqlx::query_as::<_, (i64, i32)>(&sql)
        .bind(child_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.label())))?;

    Ok(Located {
        parent_id,
        position,
    })
}

/// Locks the parent row. Fails with `NotFound` if it does not exist.
async fn lock_parent(
    conn: &mut PgConnection,
    kind: SiblingKind,
    parent_id: i64,
) -> Result<(), AppError> {
    let sql = format!("SELECT id FROM {} WHERE id = $1 FOR NO KEY UPDATE", kind.parent_table());
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(parent_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.parent_label())))?;
    Ok(())
}

/// Locks and snapshots every child of `parent_id`.
async fn lock_siblings(
    conn: &mut PgConnection,
    kind: SiblingKind,
    parent_id: i64,
) -> Result<SiblingSet, AppError> {
    let sql = format!(
        "SELECT id, position FROM {} WHERE {} = $1 ORDER BY position, id FOR NO KEY UPDATE",
        kind.table(),
        kind.parent_column()
    );
    let rows = sqlx::query_as::<_, (i64, i32)>(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(SiblingSet::new(
        rows.into_iter()
            .map(|(id, position)| Slot { id, position })
            .collect(),
    ))
}

async fn apply(
    conn: &mut PgConnection,
    kind: SiblingKind,
    moves: &[Reposition],
) -> Result<(), AppError> {
    if moves.is_empty() {
        return Ok(());
    }

    let ids: Vec<i64> = moves.iter().map(|m| m.id).collect();
    let positions: Vec<i32> = moves.iter().map(|m| m.position).collect();
    let sql = format!(
        "UPDATE {table} AS t SET position = v.position \
         FROM UNNEST($1::BIGINT[], $2::INT[]) AS v(id, position) \
         WHERE t.id = v.id",
        table = kind.table()
    );
    sqlx::query(&sql)
        .bind(ids)
        .bind(positions)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Locks `parent_id`'s children and shifts them to free a slot for a new
/// child. Returns the position the caller must insert the child at.
pub async fn make_room(
    conn: &mut PgConnection,
    kind: SiblingKind,
    parent_id: i64,
    requested: Option<i32>,
) -> Result<i32, AppError> {
    lock_parent(conn, kind, parent_id).await?;
    let siblings = lock_siblings(conn, kind, parent_id).await?;
    let placement = siblings.insert(normalize_position(requested));
    apply(conn, kind, &placement.shifts).await?;

    tracing::debug!(
        "{} slot {} reserved under {} {} ({} shifted)",
        kind.label(),
        placement.position,
        kind.parent_label(),
        parent_id,
        placement.shifts.len()
    );
    Ok(placement.position)
}

/// Moves a child to `requested` within its current parent by swapping it with
/// the sibling at the target slot. Returns the child's new position.
pub async fn reorder_within(
    conn: &mut PgConnection,
    kind: SiblingKind,
    child_id: i64,
    requested: Option<i32>,
) -> Result<i32, AppError> {
    let located = locate(conn, kind, child_id).await?;
    lock_parent(conn, kind, located.parent_id).await?;
    let siblings = lock_siblings(conn, kind, located.parent_id).await?;

    let current = siblings
        .position_of(child_id)
        .ok_or_else(|| moved_concurrently(kind, child_id))?;
    let moves = siblings
        .swap(child_id, normalize_position(requested))
        .ok_or_else(|| moved_concurrently(kind, child_id))?;
    apply(conn, kind, &moves).await?;

    let position = moves
        .iter()
        .find(|m| m.id == child_id)
        .map_or(current, |m| m.position);
    tracing::debug!(
        "{} {} reordered from {} to {}",
        kind.label(),
        child_id,
        current,
        position
    );
    Ok(position)
}

/// Reparents a child: closes its gap in the old parent and inserts it at
/// `requested` in `target_parent_id`. When the target is the current parent
/// this is a within-parent reorder. Returns the child's new position.
pub async fn move_to(
    conn: &mut PgConnection,
    kind: SiblingKind,
    child_id: i64,
    target_parent_id: i64,
    requested: Option<i32>,
) -> Result<i32, AppError> {
    let located = locate(conn, kind, child_id).await?;
    if located.parent_id == target_parent_id {
        return match requested {
            Some(_) => reorder_within(conn, kind, child_id, requested).await,
            None => Ok(located.position),
        };
    }

    // Fixed lock order across both parents avoids deadlocks between opposite moves.
    let source_id = located.parent_id;
    let (first, second) = if source_id < target_parent_id {
        (source_id, target_parent_id)
    } else {
        (target_parent_id, source_id)
    };
    lock_parent(conn, kind, first).await?;
    lock_parent(conn, kind, second).await?;
    let first_set = lock_siblings(conn, kind, first).await?;
    let second_set = lock_siblings(conn, kind, second).await?;
    let (source, target) = if first == source_id {
        (first_set, second_set)
    } else {
        (second_set, first_set)
    };

    let leaving = source
        .detach(child_id)
        .ok_or_else(|| moved_concurrently(kind, child_id))?;
    apply(conn, kind, &leaving).await?;

    let placement = target.insert(normalize_position(requested));
    apply(conn, kind, &placement.shifts).await?;

    let sql = format!(
        "UPDATE {} SET {} = $1, position = $2 WHERE id = $3",
        kind.table(),
        kind.parent_column()
    );
    sqlx::query(&sql)
        .bind(target_parent_id)
        .bind(placement.position)
        .bind(child_id)
        .execute(&mut *conn)
        .await?;

    tracing::info!(
        "{} {} moved from {} {} to {} {} at position {}",
        kind.label(),
        child_id,
        kind.parent_label(),
        source_id,
        kind.parent_label(),
        target_parent_id,
        placement.position
    );
    Ok(placement.position)
}

/// Deletes a child and closes the gap it leaves behind.
pub async fn remove(
    conn: &mut PgConnection,
    kind: SiblingKind,
    child_id: i64,
) -> Result<(), AppError> {
    let located = locate(conn, kind, child_id).await?;
    lock_parent(conn, kind, located.parent_id).await?;
    let siblings = lock_siblings(conn, kind, located.parent_id).await?;
    let moves = siblings
        .detach(child_id)
        .ok_or_else(|| moved_concurrently(kind, child_id))?;

    let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
    sqlx::query(&sql)
        .bind(child_id)
        .execute(&mut *conn)
        .await?;
    apply(conn, kind, &moves).await?;

    tracing::info!(
        "{} {} deleted from {} {} ({} shifted down)",
        kind.label(),
        child_id,
        kind.parent_label(),
        located.parent_id,
        moves.len()
    );
    Ok(())
}
