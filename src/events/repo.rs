use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, warn};

use super::repo_types::{Event, EventDraft, EventRow, EventStatus, NewParticipant, Participant};
use crate::event_time::EventTimeError;

macro_rules! event_columns {
    () => {
        "event_id, event_location, event_date, meet_location, meet_time, total_seats, \
         seats_taken, require_member, open_datetime, close_datetime, event_status"
    };
}

macro_rules! participant_columns {
    () => {
        "participant_id, event_id, first_name, surname, member"
    };
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("event {0} not found")]
    EventNotFound(i64),
    #[error("participant {0} not found")]
    ParticipantNotFound(i64),
    #[error("no seats available")]
    NoSeats,
    #[error("participant name already exists for the event")]
    DuplicateName,
    #[error("event is closed")]
    EventClosed,
    #[error("total seats cannot be below the {taken} seats already taken")]
    SeatsBelowTaken { taken: i64 },
    #[error("invalid event: {0}")]
    Invalid(String),
    #[error("event {id} has an unreadable schedule: {source}")]
    CorruptRow {
        id: i64,
        #[source]
        source: EventTimeError,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create(&self, draft: &EventDraft) -> Result<Event, StoreError>;
    async fn get(&self, id: i64) -> Result<Event, StoreError>;
    /// Every readable event; rows with an unparseable schedule are logged and skipped.
    async fn list(&self) -> Result<Vec<Event>, StoreError>;
    async fn update(&self, id: i64, draft: &EventDraft) -> Result<Event, StoreError>;
    /// Removes the event together with all of its participants.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
    /// Takes one seat and records the participant as a single unit.
    async fn add_participant(
        &self,
        event_id: i64,
        new: &NewParticipant,
    ) -> Result<Participant, StoreError>;
    /// Removes the participant and gives its seat back to the event.
    async fn delete_participant(&self, id: i64) -> Result<Participant, StoreError>;
    async fn participant(&self, id: i64) -> Result<Participant, StoreError>;
    async fn participants(&self, event_id: i64) -> Result<Vec<Participant>, StoreError>;
    /// Scheduled → Closed. Returns `false` if the event was already closed.
    async fn close_event(&self, id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct SqliteEventStore {
    db: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn into_event(row: EventRow) -> Result<Event, StoreError> {
    let id = row.event_id;
    Event::try_from(row).map_err(|source| StoreError::CorruptRow { id, source })
}

fn map_unique(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateName,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn create(&self, draft: &EventDraft) -> Result<Event, StoreError> {
        draft.validate().map_err(StoreError::Invalid)?;
        // Autocommit leaves a RETURNING insert uncommitted until the connection runs again.
        let mut tx = self.db.begin().await?;
        let row = sqlx::query_as::<_, EventRow>(concat!(
            "INSERT INTO events (event_location, event_date, meet_location, meet_time, ",
            "total_seats, require_member, open_datetime, close_datetime, event_status) ",
            "VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING ",
            event_columns!()
        ))
        .bind(&draft.location)
        .bind(&draft.date)
        .bind(&draft.meet_location)
        .bind(&draft.meet_time)
        .bind(draft.total_seats)
        .bind(draft.require_member)
        .bind(draft.opens.to_string())
        .bind(draft.closes.to_string())
        .bind(draft.status.unwrap_or_default())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        debug!(event_id = row.event_id, "event created");
        into_event(row)
    }

    async fn get(&self, id: i64) -> Result<Event, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(concat!(
            "SELECT ",
            event_columns!(),
            " FROM events WHERE event_id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::EventNotFound(id))?;
        into_event(row)
    }

    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(concat!(
            "SELECT ",
            event_columns!(),
            " FROM events ORDER BY event_id"
        ))
        .fetch_all(&self.db)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            match into_event(row) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, "skipping event"),
            }
        }
        Ok(events)
    }

    async fn update(&self, id: i64, draft: &EventDraft) -> Result<Event, StoreError> {
        draft.validate().map_err(StoreError::Invalid)?;
        // MAX() keeps a closed event closed.
        let result = sqlx::query(
            r#"
            UPDATE events
               SET event_location = ?,
                   event_date = ?,
                   meet_location = ?,
                   meet_time = ?,
                   total_seats = ?,
                   require_member = ?,
                   open_datetime = ?,
                   close_datetime = ?,
                   event_status = MAX(event_status, COALESCE(?, event_status))
             WHERE event_id = ? AND seats_taken <= ?
            "#,
        )
        .bind(&draft.location)
        .bind(&draft.date)
        .bind(&draft.meet_location)
        .bind(&draft.meet_time)
        .bind(draft.total_seats)
        .bind(draft.require_member)
        .bind(draft.opens.to_string())
        .bind(draft.closes.to_string())
        .bind(draft.status)
        .bind(id)
        .bind(draft.total_seats)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let taken: Option<i64> =
                sqlx::query_scalar("SELECT seats_taken FROM events WHERE event_id = ?")
                    .bind(id)
                    .fetch_optional(&self.db)
                    .await?;
            return Err(match taken {
                None => StoreError::EventNotFound(id),
                Some(taken) => StoreError::SeatsBelowTaken { taken },
            });
        }
        self.get(id).await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;
        let removed = sqlx::query("DELETE FROM events WHERE event_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::EventNotFound(id));
        }
        let cascaded = sqlx::query("DELETE FROM participants WHERE event_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(event_id = id, participants = cascaded.rows_affected(), "event deleted");
        Ok(())
    }

    async fn add_participant(
        &self,
        event_id: i64,
        new: &NewParticipant,
    ) -> Result<Participant, StoreError> {
        let mut tx = self.db.begin().await?;

        // Writing first takes the database write lock, so competing
        // registrations queue behind this one instead of reading stale counts.
        let claimed = sqlx::query(
            r#"
            UPDATE events
               SET seats_taken = seats_taken + 1
             WHERE event_id = ? AND seats_taken < total_seats AND event_status = ?
            "#,
        )
        .bind(event_id)
        .bind(EventStatus::Scheduled)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let status: Option<EventStatus> =
                sqlx::query_scalar("SELECT event_status FROM events WHERE event_id = ?")
                    .bind(event_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Err(match status {
                None => StoreError::EventNotFound(event_id),
                Some(EventStatus::Closed) => StoreError::EventClosed,
                Some(EventStatus::Scheduled) => StoreError::NoSeats,
            });
        }

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM participants WHERE event_id = ? AND first_name = ? AND surname = ?",
        )
        .bind(event_id)
        .bind(&new.first_name)
        .bind(&new.surname)
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            tx.rollback().await?;
            return Err(StoreError::DuplicateName);
        }

        let inserted = sqlx::query_as::<_, Participant>(concat!(
            "INSERT INTO participants (event_id, first_name, surname, member) ",
            "VALUES (?, ?, ?, ?) RETURNING ",
            participant_columns!()
        ))
        .bind(event_id)
        .bind(&new.first_name)
        .bind(&new.surname)
        .bind(new.member)
        .fetch_one(&mut *tx)
        .await;

        let participant = match inserted {
            Ok(p) => p,
            Err(e) => {
                tx.rollback().await?;
                return Err(map_unique(e));
            }
        };

        tx.commit().await?;
        debug!(event_id, participant_id = participant.participant_id, "participant added");
        Ok(participant)
    }

    async fn delete_participant(&self, id: i64) -> Result<Participant, StoreError> {
        let mut tx = self.db.begin().await?;
        let removed = sqlx::query_as::<_, Participant>(concat!(
            "DELETE FROM participants WHERE participant_id = ? RETURNING ",
            participant_columns!()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(participant) = removed else {
            tx.rollback().await?;
            return Err(StoreError::ParticipantNotFound(id));
        };

        let released = sqlx::query(
            "UPDATE events SET seats_taken = seats_taken - 1 WHERE event_id = ? AND seats_taken > 0",
        )
        .bind(participant.event_id)
        .execute(&mut *tx)
        .await?;
        if released.rows_affected() == 0 {
            warn!(
                event_id = participant.event_id,
                participant_id = id,
                "participant removed without a seat to release"
            );
        }

        tx.commit().await?;
        Ok(participant)
    }

    async fn participant(&self, id: i64) -> Result<Participant, StoreError> {
        sqlx::query_as::<_, Participant>(concat!(
            "SELECT ",
            participant_columns!(),
            " FROM participants WHERE participant_id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::ParticipantNotFound(id))
    }

    async fn participants(&self, event_id: i64) -> Result<Vec<Participant>, StoreError> {
        let rows = sqlx::query_as::<_, Participant>(concat!(
            "SELECT ",
            participant_columns!(),
            " FROM participants WHERE event_id = ? ORDER BY participant_id"
        ))
        .bind(event_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn close_event(&self, id: i64) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE events SET event_status = ? WHERE event_id = ? AND event_status = ?")
                .bind(EventStatus::Closed)
                .bind(id)
                .bind(EventStatus::Scheduled)
                .execute(&self.db)
                .await?;
        Ok(result.rows_affected() == 1)
    }
}
