//! 学习进度存储（SQLite）
//!
//! 记录每次作答（用户、主题、题目、对错），并按主题聚合出正确率，
//! 供进度工具向用户展示薄弱环节。

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

/// 单主题聚合进度
#[derive(Clone, Debug, PartialEq)]
pub struct TopicProgress {
    pub topic: String,
    pub total: u32,
    pub correct: u32,
}

impl TopicProgress {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total) * 100.0
        }
    }
}

/// 进度存储：同步 rusqlite 连接，Mutex 串行化访问
pub struct ProgressStore {
    conn: Mutex<Connection>,
}

impl ProgressStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                topic TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                correct INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn record_answer(
        &self,
        user_id: &str,
        topic: &str,
        question: &str,
        answer: &str,
        correct: bool,
    ) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO answers (user_id, topic, question, answer, correct, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                topic,
                question,
                answer,
                correct as i64,
                chrono::Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// 按主题聚合：总题数、答对数
    pub fn topic_progress(&self, user_id: &str) -> Result<Vec<TopicProgress>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT topic, COUNT(*), SUM(correct) FROM answers
             WHERE user_id = ?1 GROUP BY topic ORDER BY topic",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(TopicProgress {
                topic: row.get(0)?,
                total: row.get(1)?,
                correct: row.get::<_, Option<u32>>(2)?.unwrap_or(0),
            })
        })?;
        rows.collect()
    }
}
