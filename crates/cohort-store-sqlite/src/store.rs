//! The SQLite implementation of [`Store`].
//!
//! Guarded mutations run their existence checks and writes inside one
//! transaction within a single `call`, so each is atomic with respect to every
//! other request. Such closures return `Result<Result<T, CoreError>>`: the
//! outer layer carries database failures, the inner one domain refusals.

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tokio::sync::broadcast;
use uuid::Uuid;

use cohort_core::{
  Error as CoreError,
  comment::{Comment, CommentParent, NewComment},
  events::{ChangeEvent, ChangeFeed},
  group::{Group, GroupStatus, NewGroup},
  participant::{Feedback, NewFeedback, NewParticipant, Participant},
  season::{NewSeason, NewTask, Season, Task},
  store::Store,
};

use crate::{
  encode::{
    RawComment, RawFeedback, RawGroup, RawParticipant, RawSeason, RawTask,
    encode_dt, encode_parent, encode_status, encode_uuid, now, stored_precision,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn row_exists(
  conn: &rusqlite::Connection,
  sql: &str,
  id: &str,
) -> rusqlite::Result<bool> {
  Ok(conn.query_row(sql, [id], |_| Ok(())).optional()?.is_some())
}

fn parent_exists_sql(parent: CommentParent) -> &'static str {
  match parent {
    CommentParent::Season(_) => "SELECT 1 FROM seasons WHERE season_id = ?1",
    CommentParent::Task(_) => "SELECT 1 FROM tasks WHERE task_id = ?1",
  }
}

const PARTICIPANT_EXISTS: &str =
  "SELECT 1 FROM participants WHERE participant_id = ?1";
const GROUP_EXISTS: &str =
  "SELECT 1 FROM participant_groups WHERE group_id = ?1";

fn read_members(
  conn: &rusqlite::Connection,
  group_id: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT participant_id FROM group_members
     WHERE group_id = ?1
     ORDER BY position",
  )?;
  stmt
    .query_map([group_id], |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()
}

/// Run a `SELECT group_id, status, region, created_at ...` query and attach
/// each group's members.
fn read_groups(
  conn: &rusqlite::Connection,
  sql: &str,
  params: &[&dyn rusqlite::ToSql],
) -> rusqlite::Result<Vec<RawGroup>> {
  let mut stmt = conn.prepare(sql)?;
  let heads = stmt
    .query_map(params, |row| {
      Ok(RawGroup {
        group_id:     row.get(0)?,
        status:       row.get(1)?,
        region:       row.get(2)?,
        created_at:   row.get(3)?,
        participants: Vec::new(),
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  heads
    .into_iter()
    .map(|mut g| -> rusqlite::Result<RawGroup> {
      g.participants = read_members(conn, &g.group_id)?;
      Ok(g)
    })
    .collect()
}

fn read_group(
  conn: &rusqlite::Connection,
  group_id: &str,
) -> rusqlite::Result<Option<RawGroup>> {
  Ok(
    read_groups(
      conn,
      "SELECT group_id, status, region, created_at
       FROM participant_groups WHERE group_id = ?1",
      rusqlite::params![group_id],
    )?
    .pop(),
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Cohort document store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and change feed are
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  feed: ChangeFeed,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, feed: ChangeFeed::new() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, feed: ChangeFeed::new() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema initialised");
    Ok(())
  }
}

// ─── Store impl ──────────────────────────────────────────────────────────────

impl Store for SqliteStore {
  type Error = Error;

  // ── Seasons & tasks ───────────────────────────────────────────────────────

  async fn create_season(&self, input: NewSeason) -> Result<Season> {
    if input.name.trim().is_empty() {
      return Err(CoreError::InvalidInput("season name is empty".into()).into());
    }

    let season = Season {
      season_id:   Uuid::new_v4(),
      name:        input.name,
      description: input.description,
      created_at:  now(),
    };

    let id_str = encode_uuid(season.season_id);
    let name   = season.name.clone();
    let desc   = season.description.clone();
    let at_str = encode_dt(season.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO seasons (season_id, name, description, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, desc, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.feed.publish(ChangeEvent::SeasonCreated { season_id: season.season_id });
    Ok(season)
  }

  async fn get_season(&self, id: Uuid) -> Result<Option<Season>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSeason> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM seasons WHERE season_id = ?1",
                RawSeason::COLUMNS
              ),
              [id_str],
              RawSeason::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSeason::into_season).transpose()
  }

  async fn list_seasons(&self) -> Result<Vec<Season>> {
    let raws: Vec<RawSeason> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM seasons ORDER BY created_at DESC, rowid DESC",
          RawSeason::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawSeason::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSeason::into_season).collect()
  }

  async fn create_task(&self, input: NewTask) -> Result<Task> {
    if input.title.trim().is_empty() {
      return Err(CoreError::InvalidInput("task title is empty".into()).into());
    }

    let task = Task {
      task_id:     Uuid::new_v4(),
      season_id:   input.season_id,
      title:       input.title,
      description: input.description,
      created_at:  now(),
    };

    let id_str     = encode_uuid(task.task_id);
    let season_str = encode_uuid(task.season_id);
    let title      = task.title.clone();
    let desc       = task.description.clone();
    let at_str     = encode_dt(task.created_at);
    let season_id  = task.season_id;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, "SELECT 1 FROM seasons WHERE season_id = ?1", &season_str)? {
          return Ok(Err(CoreError::SeasonNotFound(season_id)));
        }
        tx.execute(
          "INSERT INTO tasks (task_id, season_id, title, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, season_str, title, desc, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    self.feed.publish(ChangeEvent::TaskCreated {
      season_id: task.season_id,
      task_id:   task.task_id,
    });
    Ok(task)
  }

  async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawTask> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM tasks WHERE task_id = ?1", RawTask::COLUMNS),
              [id_str],
              RawTask::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTask::into_task).transpose()
  }

  async fn list_tasks(&self, season_id: Uuid) -> Result<Vec<Task>> {
    let season_str = encode_uuid(season_id);

    let raws: Vec<RawTask> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM tasks WHERE season_id = ?1
           ORDER BY created_at, rowid",
          RawTask::COLUMNS
        ))?;
        let rows = stmt
          .query_map([season_str], RawTask::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTask::into_task).collect()
  }

  async fn delete_task(&self, id: Uuid) -> Result<Task> {
    let id_str = encode_uuid(id);

    let raw: RawTask = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!("SELECT {} FROM tasks WHERE task_id = ?1", RawTask::COLUMNS),
            [&id_str],
            RawTask::from_row,
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(Err(CoreError::TaskNotFound(id)));
        };
        tx.execute(
          "DELETE FROM comments WHERE parent_kind = 'task' AND parent_id = ?1",
          [&id_str],
        )?;
        tx.execute("DELETE FROM tasks WHERE task_id = ?1", [&id_str])?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    let task = raw.into_task()?;
    self.feed.publish(ChangeEvent::TaskDeleted {
      season_id: task.season_id,
      task_id:   task.task_id,
    });
    Ok(task)
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn add_comment(&self, input: NewComment) -> Result<Comment> {
    input.validate()?;

    let comment = Comment {
      comment_id:  Uuid::new_v4(),
      parent:      input.parent,
      author_id:   input.author_id,
      author_name: input.author_name,
      text:        input.text,
      created_at:  now(),
    };

    let parent              = comment.parent;
    let (kind, parent_str)  = encode_parent(parent);
    let exists_sql          = parent_exists_sql(parent);
    let id_str              = encode_uuid(comment.comment_id);
    let author_id           = comment.author_id.clone();
    let author_name         = comment.author_name.clone();
    let body                = comment.text.clone();
    let at_str              = encode_dt(comment.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, exists_sql, &parent_str)? {
          return Ok(Err(parent.not_found()));
        }
        tx.execute(
          "INSERT INTO comments (
             comment_id, parent_kind, parent_id, author_id, author_name,
             body, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            kind,
            parent_str,
            author_id,
            author_name,
            body,
            at_str,
          ],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    self.feed.publish(ChangeEvent::CommentAdded {
      parent:     comment.parent,
      comment_id: comment.comment_id,
    });
    Ok(comment)
  }

  async fn delete_comment(&self, id: Uuid) -> Result<Comment> {
    let id_str = encode_uuid(id);

    let raw: RawComment = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!(
              "SELECT {} FROM comments WHERE comment_id = ?1",
              RawComment::COLUMNS
            ),
            [&id_str],
            RawComment::from_row,
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(Err(CoreError::CommentNotFound(id)));
        };
        tx.execute("DELETE FROM comments WHERE comment_id = ?1", [&id_str])?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    let comment = raw.into_comment()?;
    self.feed.publish(ChangeEvent::CommentDeleted {
      parent:     comment.parent,
      comment_id: comment.comment_id,
    });
    Ok(comment)
  }

  async fn list_comments(&self, parent: CommentParent) -> Result<Vec<Comment>> {
    let (kind, parent_str) = encode_parent(parent);

    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM comments
           WHERE parent_kind = ?1 AND parent_id = ?2
           ORDER BY created_at, rowid",
          RawComment::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![kind, parent_str], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }

  // ── Participants & feedback ───────────────────────────────────────────────

  async fn upsert_participant(&self, input: NewParticipant) -> Result<Participant> {
    let id_str      = encode_uuid(Uuid::new_v4());
    let at_str      = encode_dt(now());
    let telegram_id = input.telegram_id;

    let raw: RawParticipant = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO participants (
             participant_id, telegram_id, first_name, last_name, username,
             region, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (telegram_id) DO UPDATE SET
             first_name = excluded.first_name,
             last_name  = excluded.last_name,
             username   = excluded.username,
             region     = COALESCE(excluded.region, participants.region)",
          rusqlite::params![
            id_str,
            input.telegram_id,
            input.first_name,
            input.last_name,
            input.username,
            input.region,
            at_str,
          ],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {} FROM participants WHERE telegram_id = ?1",
            RawParticipant::COLUMNS
          ),
          [telegram_id],
          RawParticipant::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let participant = raw.into_participant()?;
    self.feed.publish(ChangeEvent::ParticipantUpserted {
      participant_id: participant.participant_id,
    });
    Ok(participant)
  }

  async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawParticipant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM participants WHERE participant_id = ?1",
                RawParticipant::COLUMNS
              ),
              [id_str],
              RawParticipant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawParticipant::into_participant).transpose()
  }

  async fn find_participant_by_telegram_id(
    &self,
    telegram_id: i64,
  ) -> Result<Option<Participant>> {
    let raw: Option<RawParticipant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM participants WHERE telegram_id = ?1",
                RawParticipant::COLUMNS
              ),
              [telegram_id],
              RawParticipant::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawParticipant::into_participant).transpose()
  }

  async fn list_participants(&self) -> Result<Vec<Participant>> {
    let raws: Vec<RawParticipant> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM participants ORDER BY created_at, rowid",
          RawParticipant::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawParticipant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawParticipant::into_participant).collect()
  }

  async fn submit_feedback(&self, input: NewFeedback) -> Result<Feedback> {
    if input.content.trim().is_empty() {
      return Err(CoreError::InvalidInput("feedback is empty".into()).into());
    }

    let feedback = Feedback {
      feedback_id:    Uuid::new_v4(),
      participant_id: input.participant_id,
      group_id:       input.group_id,
      content:        input.content,
      created_at:     now(),
    };

    let id_str          = encode_uuid(feedback.feedback_id);
    let participant_id  = feedback.participant_id;
    let participant_str = encode_uuid(participant_id);
    let group_id        = feedback.group_id;
    let content         = feedback.content.clone();
    let at_str          = encode_dt(feedback.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, PARTICIPANT_EXISTS, &participant_str)? {
          return Ok(Err(CoreError::ParticipantNotFound(participant_id)));
        }
        let group_str = group_id.map(encode_uuid);
        if let (Some(gid), Some(gstr)) = (group_id, group_str.as_deref())
          && !row_exists(&tx, GROUP_EXISTS, gstr)?
        {
          return Ok(Err(CoreError::GroupNotFound(gid)));
        }
        tx.execute(
          "INSERT INTO feedback (feedback_id, participant_id, group_id, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, participant_str, group_str, content, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    self.feed.publish(ChangeEvent::FeedbackSubmitted {
      participant_id: feedback.participant_id,
      feedback_id:    feedback.feedback_id,
    });
    Ok(feedback)
  }

  async fn list_feedback(&self, participant_id: Uuid) -> Result<Vec<Feedback>> {
    let participant_str = encode_uuid(participant_id);

    let raws: Vec<RawFeedback> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM feedback WHERE participant_id = ?1
           ORDER BY created_at, rowid",
          RawFeedback::COLUMNS
        ))?;
        let rows = stmt
          .query_map([participant_str], RawFeedback::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFeedback::into_feedback).collect()
  }

  async fn delete_feedback_for_participant(&self, participant_id: Uuid) -> Result<u64> {
    let participant_str = encode_uuid(participant_id);

    let count = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "DELETE FROM feedback WHERE participant_id = ?1",
          [participant_str],
        )?;
        Ok(n as u64)
      })
      .await?;

    tracing::debug!(%participant_id, count, "deleted participant feedback");
    if count > 0 {
      self.feed.publish(ChangeEvent::FeedbackDeleted { participant_id, count });
    }
    Ok(count)
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn create_group(&self, input: NewGroup) -> Result<Group> {
    input.validate()?;

    let group = Group {
      group_id:     Uuid::new_v4(),
      participants: input.participants,
      status:       input.status,
      region:       input.region,
      created_at:   input.created_at.map(stored_precision).unwrap_or_else(now),
    };

    let id_str     = encode_uuid(group.group_id);
    let members    = group.participants.clone();
    let status_str = encode_status(group.status);
    let region     = group.region.clone();
    let at_str     = encode_dt(group.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for member in &members {
          if !row_exists(&tx, PARTICIPANT_EXISTS, &encode_uuid(*member))? {
            return Ok(Err(CoreError::ParticipantNotFound(*member)));
          }
        }
        tx.execute(
          "INSERT INTO participant_groups (group_id, status, region, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, status_str, region, at_str],
        )?;
        for (position, member) in members.iter().enumerate() {
          tx.execute(
            "INSERT INTO group_members (group_id, participant_id, position)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![id_str, encode_uuid(*member), position as i64],
          )?;
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    self.feed.publish(ChangeEvent::GroupCreated { group_id: group.group_id });
    Ok(group)
  }

  async fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| Ok(read_group(conn, &id_str)?))
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn list_groups(&self) -> Result<Vec<Group>> {
    let raws: Vec<RawGroup> = self
      .conn
      .call(|conn| {
        Ok(read_groups(
          conn,
          "SELECT group_id, status, region, created_at
           FROM participant_groups
           ORDER BY created_at DESC, rowid DESC",
          rusqlite::params![],
        )?)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn list_groups_for_participant(&self, participant_id: Uuid) -> Result<Vec<Group>> {
    let participant_str = encode_uuid(participant_id);

    let raws: Vec<RawGroup> = self
      .conn
      .call(move |conn| {
        Ok(read_groups(
          conn,
          "SELECT g.group_id, g.status, g.region, g.created_at
           FROM participant_groups g
           JOIN group_members m ON m.group_id = g.group_id
           WHERE m.participant_id = ?1
           ORDER BY g.created_at DESC, g.rowid DESC",
          rusqlite::params![participant_str],
        )?)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  async fn set_group_status(&self, id: Uuid, status: GroupStatus) -> Result<Group> {
    let id_str     = encode_uuid(id);
    let status_str = encode_status(status);

    let raw: RawGroup = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE participant_groups SET status = ?1 WHERE group_id = ?2",
          rusqlite::params![status_str, id_str],
        )?;
        if changed == 0 {
          return Ok(Err(CoreError::GroupNotFound(id)));
        }
        let raw = read_group(&tx, &id_str)?;
        tx.commit()?;
        Ok(raw.ok_or(CoreError::GroupNotFound(id)))
      })
      .await??;

    let group = raw.into_group()?;
    self.feed.publish(ChangeEvent::GroupStatusChanged { group_id: id, status });
    Ok(group)
  }

  // ── Change feed ───────────────────────────────────────────────────────────

  fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> { self.feed.subscribe() }
}
