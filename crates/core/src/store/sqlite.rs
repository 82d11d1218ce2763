//! SQLite-backed ticket repository.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{StoreError, TicketRepository};
use crate::entry::ScanOutcome;
use crate::entry_log::{EntryAction, EntryLogFact, EntryLogFilter, EntryLogRecord};
use crate::ticket::{
    ConcertRef, ConcertTicket, EntryState, EventRef, Member, TeamTicket, TicketRecord,
};

/// Read connections for file-backed stores; one per hydrated ticket family.
const READER_CONNECTIONS: usize = 2;

/// Device id recorded for states imported through the insert helpers.
const REGISTRATION_DEVICE: &str = "registration";

/// Latest known state per (ticket, person), taken from the newest entry-log
/// row that resolved a person. `{filter}` narrows it to one ticket for point reads.
const LATEST_STATE_CTE: &str = r#"
WITH latest AS (
    SELECT ticket_code, person_id, state_after
    FROM (
        SELECT ticket_code, person_id, state_after,
               ROW_NUMBER() OVER (PARTITION BY ticket_code, person_id ORDER BY id DESC) AS rn
        FROM entry_log
        WHERE state_after IS NOT NULL AND person_id IS NOT NULL {filter}
    )
    WHERE rn = 1
)
"#;

const TEAM_SELECT: &str = r#"
SELECT t.ticket_code, t.team_id, t.team_name, t.event_name, t.event_date_label,
       t.has_arena_checkpoint, t.payment_status, m.id, m.name, l.state_after
FROM teams t
LEFT JOIN team_members m ON m.team_id = t.team_id
LEFT JOIN latest l ON l.ticket_code = t.ticket_code AND l.person_id = m.id
"#;

const CONCERT_SELECT: &str = r#"
SELECT c.ticket_code, c.guest_id, c.guest_name, c.tier, c.concert_name, c.concert_date_label,
       c.is_entered_arena, c.is_entered_main_gate, l.state_after
FROM concert_tickets c
LEFT JOIN latest l ON l.ticket_code = c.ticket_code AND l.person_id = c.guest_id
"#;

/// SQLite-backed ticket repository.
///
/// Writes and point reads share one connection. File-backed stores open extra
/// read connections (WAL mode) so both ticket families can be listed at once;
/// in-memory stores serialize everything on the single connection.
pub struct SqliteTicketRepository {
    conn: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
}

struct TeamRow {
    code: String,
    team_id: String,
    team_name: String,
    event_name: String,
    event_date_label: String,
    has_arena_checkpoint: bool,
    payment_status: String,
    member_id: Option<String>,
    member_name: Option<String>,
    state_after: Option<String>,
}

impl TeamRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(0)?,
            team_id: row.get(1)?,
            team_name: row.get(2)?,
            event_name: row.get(3)?,
            event_date_label: row.get(4)?,
            has_arena_checkpoint: row.get(5)?,
            payment_status: row.get(6)?,
            member_id: row.get(7)?,
            member_name: row.get(8)?,
            state_after: row.get(9)?,
        })
    }
}

struct ConcertRow {
    code: String,
    guest_id: String,
    guest_name: String,
    tier: String,
    concert_name: String,
    concert_date_label: String,
    is_entered_arena: bool,
    is_entered_main_gate: bool,
    state_after: Option<String>,
}

impl ConcertRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(0)?,
            guest_id: row.get(1)?,
            guest_name: row.get(2)?,
            tier: row.get(3)?,
            concert_name: row.get(4)?,
            concert_date_label: row.get(5)?,
            is_entered_arena: row.get(6)?,
            is_entered_main_gate: row.get(7)?,
            state_after: row.get(8)?,
        })
    }
}

impl SqliteTicketRepository {
    /// Open (or create) a database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Self::initialize_schema(&conn)?;

        let mut readers = Vec::with_capacity(READER_CONNECTIONS);
        for _ in 0..READER_CONNECTIONS {
            let reader = Connection::open(path)?;
            Self::configure(&reader)?;
            readers.push(Mutex::new(reader));
        }

        Ok(Self {
            conn: Mutex::new(conn),
            readers,
        })
    }

    /// Create an in-memory repository (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            readers: Vec::new(),
        })
    }

    fn configure(conn: &Connection) -> Result<(), StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        Ok(())
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                ticket_code TEXT PRIMARY KEY,
                team_id TEXT NOT NULL UNIQUE,
                team_name TEXT NOT NULL,
                event_name TEXT NOT NULL,
                event_date_label TEXT NOT NULL,
                has_arena_checkpoint INTEGER NOT NULL DEFAULT 0,
                payment_status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS team_members (
                id TEXT PRIMARY KEY,
                team_id TEXT NOT NULL REFERENCES teams(team_id),
                name TEXT NOT NULL,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS concert_tickets (
                ticket_code TEXT PRIMARY KEY,
                guest_id TEXT NOT NULL,
                guest_name TEXT NOT NULL,
                tier TEXT NOT NULL,
                concert_name TEXT NOT NULL,
                concert_date_label TEXT NOT NULL,
                is_entered_arena INTEGER NOT NULL DEFAULT 0,
                is_entered_main_gate INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS entry_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_code TEXT NOT NULL,
                person_id TEXT,
                action TEXT NOT NULL,
                outcome TEXT NOT NULL,
                state_after TEXT,
                device_id TEXT NOT NULL,
                cache_version INTEGER,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_team_members_team ON team_members(team_id, position);
            CREATE INDEX IF NOT EXISTS idx_entry_log_person ON entry_log(ticket_code, person_id, id);
            CREATE INDEX IF NOT EXISTS idx_entry_log_device ON entry_log(device_id);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    /// A free read connection, falling back to the shared one.
    fn reader(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        for reader in &self.readers {
            if let Ok(guard) = reader.try_lock() {
                return Ok(guard);
            }
        }
        match self.readers.first() {
            Some(reader) => reader
                .lock()
                .map_err(|_| StoreError::Database("reader mutex poisoned".to_string())),
            None => self.conn(),
        }
    }

    /// Register a team ticket (registration flow / tests).
    ///
    /// Members whose `last_entry_state` is not `NotEntered` get an `OVERRIDE`
    /// entry-log row so the state survives hydration.
    pub fn insert_team_ticket(&self, team: &TeamTicket) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO teams (ticket_code, team_id, team_name, event_name, event_date_label, has_arena_checkpoint, payment_status) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                team.code,
                team.team_id,
                team.team_name,
                team.event.name,
                team.event.date_label,
                team.event.has_arena_checkpoint,
                team.payment_status.as_str(),
            ],
        )?;

        for (position, member) in team.members.iter().enumerate() {
            tx.execute(
                "INSERT INTO team_members (id, team_id, name, position) VALUES (?, ?, ?, ?)",
                params![member.id, team.team_id, member.name, position as i64],
            )?;
            if member.last_entry_state != EntryState::NotEntered {
                Self::insert_fact(
                    &tx,
                    &Self::imported_state(&team.code, &member.id, member.last_entry_state),
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Register a concert ticket (registration flow / tests).
    pub fn insert_concert_ticket(&self, concert: &ConcertTicket) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO concert_tickets (ticket_code, guest_id, guest_name, tier, concert_name, concert_date_label, is_entered_arena, is_entered_main_gate) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                concert.code,
                concert.guest_id,
                concert.guest_name,
                concert.tier.as_str(),
                concert.concert.name,
                concert.concert.date_label,
                concert.is_entered_arena,
                concert.is_entered_main_gate,
            ],
        )?;

        if concert.last_entry_state != EntryState::NotEntered {
            Self::insert_fact(
                &tx,
                &Self::imported_state(&concert.code, &concert.guest_id, concert.last_entry_state),
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Register either kind of ticket.
    pub fn insert_ticket(&self, record: &TicketRecord) -> Result<(), StoreError> {
        match record {
            TicketRecord::Team(team) => self.insert_team_ticket(team),
            TicketRecord::Concert(concert) => self.insert_concert_ticket(concert),
        }
    }

    fn imported_state(code: &str, person_id: &str, state: EntryState) -> EntryLogFact {
        EntryLogFact {
            ticket_code: code.to_string(),
            person_id: Some(person_id.to_string()),
            action: EntryAction::Override,
            outcome: ScanOutcome::Accepted,
            state_after: Some(state),
            device_id: REGISTRATION_DEVICE.to_string(),
            cache_version: None,
            timestamp: Utc::now(),
        }
    }

    fn insert_fact(conn: &Connection, fact: &EntryLogFact) -> Result<i64, StoreError> {
        conn.execute(
            "INSERT INTO entry_log (ticket_code, person_id, action, outcome, state_after, device_id, cache_version, timestamp) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                fact.ticket_code,
                fact.person_id,
                fact.action.as_str(),
                fact.outcome.as_str(),
                fact.state_after.map(|s| s.as_str()),
                fact.device_id,
                fact.cache_version.map(|v| v as i64),
                fact.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_teams(
        conn: &Connection,
        code: Option<&str>,
    ) -> Result<Vec<TeamTicket>, StoreError> {
        let (cte_filter, where_clause) = match code {
            Some(_) => ("AND ticket_code = ?1", "WHERE t.ticket_code = ?1"),
            None => ("", ""),
        };
        let sql = format!(
            "{}{}{} ORDER BY t.ticket_code, m.position",
            LATEST_STATE_CTE.replace("{filter}", cte_filter),
            TEAM_SELECT,
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = match code {
            Some(code) => stmt.query_map(params![code], TeamRow::from_row)?,
            None => stmt.query_map([], TeamRow::from_row)?,
        };

        let mut teams: Vec<TeamTicket> = Vec::new();
        for row in rows {
            let row = row?;

            let is_new_team = teams.last().map(|t| t.code != row.code).unwrap_or(true);
            if is_new_team {
                teams.push(TeamTicket {
                    code: row.code.clone(),
                    team_id: row.team_id,
                    team_name: row.team_name,
                    event: EventRef {
                        name: row.event_name,
                        date_label: row.event_date_label,
                        has_arena_checkpoint: row.has_arena_checkpoint,
                    },
                    payment_status: parse_column(&row.payment_status)?,
                    members: Vec::new(),
                });
            }

            if let (Some(id), Some(name)) = (row.member_id, row.member_name) {
                let last_entry_state = match row.state_after {
                    Some(state) => parse_column(&state)?,
                    None => EntryState::NotEntered,
                };
                if let Some(team) = teams.last_mut() {
                    team.members.push(Member {
                        id,
                        name,
                        last_entry_state,
                    });
                }
            }
        }

        Ok(teams)
    }

    fn query_concerts(
        conn: &Connection,
        code: Option<&str>,
    ) -> Result<Vec<ConcertTicket>, StoreError> {
        let (cte_filter, where_clause) = match code {
            Some(_) => ("AND ticket_code = ?1", "WHERE c.ticket_code = ?1"),
            None => ("", ""),
        };
        let sql = format!(
            "{}{}{} ORDER BY c.ticket_code",
            LATEST_STATE_CTE.replace("{filter}", cte_filter),
            CONCERT_SELECT,
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = match code {
            Some(code) => stmt.query_map(params![code], ConcertRow::from_row)?,
            None => stmt.query_map([], ConcertRow::from_row)?,
        };

        let mut concerts = Vec::new();
        for row in rows {
            let row = row?;

            let mut ticket = ConcertTicket {
                code: row.code,
                guest_id: row.guest_id,
                guest_name: row.guest_name,
                tier: parse_column(&row.tier)?,
                concert: ConcertRef {
                    name: row.concert_name,
                    date_label: row.concert_date_label,
                },
                is_entered_arena: row.is_entered_arena,
                is_entered_main_gate: row.is_entered_main_gate,
                last_entry_state: EntryState::NotEntered,
            };
            if let Some(state) = row.state_after {
                let state: EntryState = parse_column(&state)?;
                ticket.last_entry_state = state;
                ticket.align_checkpoints(state);
            }
            concerts.push(ticket);
        }

        Ok(concerts)
    }

    fn build_where_clause(filter: &EntryLogFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref code) = filter.ticket_code {
            conditions.push("ticket_code = ?");
            params.push(Box::new(code.clone()));
        }

        if let Some(ref person_id) = filter.person_id {
            conditions.push("person_id = ?");
            params.push(Box::new(person_id.clone()));
        }

        if let Some(ref device_id) = filter.device_id {
            conditions.push("device_id = ?");
            params.push(Box::new(device_id.clone()));
        }

        if let Some(outcome) = filter.outcome {
            conditions.push("outcome = ?");
            params.push(Box::new(outcome.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

/// Parse a stored enum column, reporting bad values as serialization errors.
fn parse_column<T>(value: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(StoreError::Serialization)
}

impl TicketRepository for SqliteTicketRepository {
    fn list_team_tickets_with_latest_status(&self) -> Result<Vec<TeamTicket>, StoreError> {
        let conn = self.reader()?;
        Self::query_teams(&conn, None)
    }

    fn list_concert_tickets_with_latest_status(&self) -> Result<Vec<ConcertTicket>, StoreError> {
        let conn = self.reader()?;
        Self::query_concerts(&conn, None)
    }

    fn fetch_ticket(&self, code: &str) -> Result<Option<TicketRecord>, StoreError> {
        let conn = self.conn()?;

        if let Some(team) = Self::query_teams(&conn, Some(code))?.into_iter().next() {
            return Ok(Some(TicketRecord::Team(team)));
        }

        Ok(Self::query_concerts(&conn, Some(code))?
            .into_iter()
            .next()
            .map(TicketRecord::Concert))
    }

    fn record_entry_log(&self, fact: &EntryLogFact) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        Self::insert_fact(&conn, fact)
    }

    fn query_entry_log(&self, filter: &EntryLogFilter) -> Result<Vec<EntryLogRecord>, StoreError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT id, ticket_code, person_id, action, outcome, state_after, device_id, cache_version, timestamp FROM entry_log {} ORDER BY id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<i64>>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (
                id,
                ticket_code,
                person_id,
                action,
                outcome,
                state_after,
                device_id,
                cache_version,
                timestamp,
            ) = row?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| StoreError::Serialization(format!("Invalid timestamp: {}", e)))?
                .into();

            records.push(EntryLogRecord {
                id,
                fact: EntryLogFact {
                    ticket_code,
                    person_id,
                    action: parse_column(&action)?,
                    outcome: parse_column(&outcome)?,
                    state_after: state_after.as_deref().map(parse_column).transpose()?,
                    device_id,
                    cache_version: cache_version.map(|v| v as u64),
                    timestamp,
                },
            });
        }

        Ok(records)
    }

    fn count_entry_log(&self, filter: &EntryLogFilter) -> Result<i64, StoreError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM entry_log {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .optional()?
            .unwrap_or(0);
        Ok(count)
    }
}
