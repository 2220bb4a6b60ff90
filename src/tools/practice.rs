//! 练习题工具：按主题/难度出题，并记录作答
//!
//! 出题工具返回题面与选项但不含答案（答案由作答工具核对后给出）；
//! 作答工具写入进度存储，属敏感操作，计划含它时一律走人工审批。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory::ProgressStore;
use crate::tools::Tool;

/// 一道练习题
#[derive(Clone, Debug)]
pub struct PracticeQuestion {
    pub topic: String,
    /// easy / medium / hard
    pub difficulty: String,
    pub text: String,
    pub options: Vec<String>,
    /// 正确选项字母（A/B/C/D）
    pub correct: String,
    pub explanation: String,
}

/// 题库：按主题与难度查找，主题匹配为包含式（"grammar" 命中 "English Grammar"）
pub struct QuestionBank {
    questions: Vec<PracticeQuestion>,
}

impl QuestionBank {
    pub fn new(questions: Vec<PracticeQuestion>) -> Self {
        Self { questions }
    }

    /// 内置题库：覆盖语法、词汇、阅读理解与法律推理
    pub fn builtin() -> Self {
        let q = |topic: &str, difficulty: &str, text: &str, options: &[&str], correct: &str, explanation: &str| PracticeQuestion {
            topic: topic.to_string(),
            difficulty: difficulty.to_string(),
            text: text.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct: correct.to_string(),
            explanation: explanation.to_string(),
        };
        Self::new(vec![
            q(
                "Grammar",
                "easy",
                "Choose the correct sentence.",
                &[
                    "A. She don't like apples.",
                    "B. She doesn't like apples.",
                    "C. She not like apples.",
                    "D. She doesn't likes apples.",
                ],
                "B",
                "With third-person singular subjects, use 'doesn't' followed by the base verb.",
            ),
            q(
                "Grammar",
                "medium",
                "By the time we arrived, the lecture ___ already.",
                &[
                    "A. has started",
                    "B. started",
                    "C. had started",
                    "D. was starting",
                ],
                "C",
                "An action completed before another past action takes the past perfect.",
            ),
            q(
                "Vocabulary",
                "medium",
                "Pick the closest synonym of 'ephemeral'.",
                &["A. eternal", "B. fleeting", "C. robust", "D. obscure"],
                "B",
                "'Ephemeral' means lasting for a very short time, i.e. fleeting.",
            ),
            q(
                "Reading Comprehension",
                "medium",
                "The primary purpose of a topic sentence is to ___.",
                &[
                    "A. conclude the essay",
                    "B. state the main idea of a paragraph",
                    "C. provide a citation",
                    "D. introduce a counterargument",
                ],
                "B",
                "A topic sentence states the controlling idea its paragraph develops.",
            ),
            q(
                "Legal Reasoning",
                "medium",
                "A valid contract requires offer, acceptance and ___.",
                &["A. consideration", "B. registration", "C. notarization", "D. publication"],
                "A",
                "Consideration is the bargained-for exchange that makes an agreement binding.",
            ),
            q(
                "Legal Reasoning",
                "hard",
                "The principle that a later statute overrides an earlier conflicting one is called ___.",
                &[
                    "A. stare decisis",
                    "B. lex posterior derogat priori",
                    "C. res judicata",
                    "D. audi alteram partem",
                ],
                "B",
                "Lex posterior derogat priori: the later law repeals the earlier to the extent of conflict.",
            ),
        ])
    }

    /// 先按主题 + 难度找；难度无匹配时放宽到同主题任意难度，再放宽到任意题目
    pub fn find(&self, topic: &str, difficulty: &str) -> Option<(usize, &PracticeQuestion)> {
        let topic_lower = topic.to_lowercase();
        let matches_topic = |q: &PracticeQuestion| {
            topic_lower.is_empty()
                || q.topic.to_lowercase().contains(&topic_lower)
                || topic_lower.contains(&q.topic.to_lowercase())
        };

        self.questions
            .iter()
            .enumerate()
            .find(|(_, q)| matches_topic(q) && q.difficulty.eq_ignore_ascii_case(difficulty))
            .or_else(|| self.questions.iter().enumerate().find(|(_, q)| matches_topic(q)))
            .or_else(|| self.questions.iter().enumerate().next())
    }

    pub fn by_id(&self, id: usize) -> Option<&PracticeQuestion> {
        self.questions.get(id)
    }
}

/// 出题工具：按主题与难度返回一道题（不含答案）
pub struct PracticeQuestionTool {
    bank: Arc<QuestionBank>,
}

impl PracticeQuestionTool {
    pub fn new(bank: Arc<QuestionBank>) -> Self {
        Self { bank }
    }
}

#[async_trait]
impl Tool for PracticeQuestionTool {
    fn name(&self) -> &str {
        "get_practice_question"
    }

    fn description(&self) -> &str {
        "Get a practice question by topic and difficulty. Present it to the user and wait for \
         their answer; never answer it yourself. \
         Args: {\"topic\": \"Grammar\", \"difficulty\": \"medium\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "e.g. Grammar, Vocabulary, Legal Reasoning"
                },
                "difficulty": {
                    "type": "string",
                    "description": "easy / medium / hard"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let topic = args.get("topic").and_then(|v| v.as_str()).unwrap_or("");
        let difficulty = args
            .get("difficulty")
            .and_then(|v| v.as_str())
            .unwrap_or("medium");

        let (id, question) = self
            .bank
            .find(topic, difficulty)
            .ok_or_else(|| "Question bank is empty".to_string())?;

        // 不带 correct / explanation：答案在作答后才揭示
        Ok(json!({
            "question_id": id,
            "topic": question.topic,
            "difficulty": question.difficulty,
            "text": question.text,
            "options": question.options,
        }))
    }
}

/// 作答工具：核对答案并写入进度存储（敏感：修改用户学习数据）
pub struct RecordAnswerTool {
    bank: Arc<QuestionBank>,
    progress: Arc<ProgressStore>,
}

impl RecordAnswerTool {
    pub fn new(bank: Arc<QuestionBank>, progress: Arc<ProgressStore>) -> Self {
        Self { bank, progress }
    }
}

#[async_trait]
impl Tool for RecordAnswerTool {
    fn name(&self) -> &str {
        "record_practice_answer"
    }

    fn description(&self) -> &str {
        "Check the user's answer to a practice question and record it in their learning history. \
         Args: {\"question_id\": 0, \"answer\": \"B\"}"
    }

    fn sensitive(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question_id": {
                    "type": "integer",
                    "description": "id returned by get_practice_question"
                },
                "answer": {
                    "type": "string",
                    "description": "the user's chosen option letter"
                },
                "user_id": {
                    "type": "string",
                    "description": "filled in automatically when omitted"
                }
            },
            "required": ["question_id", "answer"]
        })
    }

    fn strict_arguments(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let question_id = args
            .get("question_id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| "Missing question_id".to_string())? as usize;
        let answer = args
            .get("answer")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| "Missing answer".to_string())?;
        let user_id = args
            .get("user_id")
            .and_then(|v| v.as_str())
            .unwrap_or("anonymous");

        let question = self
            .bank
            .by_id(question_id)
            .ok_or_else(|| format!("Unknown question_id: {question_id}"))?;

        // 只比较选项字母，容忍 "b" / "B." / "B) ..." 等写法
        let given = answer
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase().to_string())
            .unwrap_or_default();
        let correct = given == question.correct;

        self.progress
            .record_answer(user_id, &question.topic, &question.text, answer, correct)
            .map_err(|e| format!("Failed to record answer: {e}"))?;

        Ok(json!({
            "correct": correct,
            "correct_answer": question.correct,
            "explanation": question.explanation,
            "recorded": true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn question_payload_hides_the_answer() {
        let tool = PracticeQuestionTool::new(Arc::new(QuestionBank::builtin()));
        let payload = tool
            .execute(json!({"topic": "grammar", "difficulty": "easy"}))
            .await
            .unwrap();

        assert_eq!(payload["topic"], "Grammar");
        assert!(payload.get("correct").is_none());
        assert!(payload.get("explanation").is_none());
    }

    #[tokio::test]
    async fn difficulty_falls_back_within_topic() {
        let tool = PracticeQuestionTool::new(Arc::new(QuestionBank::builtin()));
        let payload = tool
            .execute(json!({"topic": "Vocabulary", "difficulty": "hard"}))
            .await
            .unwrap();
        assert_eq!(payload["topic"], "Vocabulary");
    }

    #[tokio::test]
    async fn answers_are_checked_and_recorded() {
        let bank = Arc::new(QuestionBank::builtin());
        let progress = Arc::new(ProgressStore::open_in_memory().unwrap());
        let tool = RecordAnswerTool::new(bank, progress.clone());

        let payload = tool
            .execute(json!({"question_id": 0, "answer": "b", "user_id": "u1"}))
            .await
            .unwrap();
        assert_eq!(payload["correct"], true);

        let stats = progress.topic_progress("u1").unwrap();
        assert_eq!(stats[0].total, 1);
        assert_eq!(stats[0].correct, 1);
    }

    #[tokio::test]
    async fn unknown_question_id_is_an_error() {
        let bank = Arc::new(QuestionBank::builtin());
        let progress = Arc::new(ProgressStore::open_in_memory().unwrap());
        let tool = RecordAnswerTool::new(bank, progress);
        assert!(tool
            .execute(json!({"question_id": 999, "answer": "A"}))
            .await
            .is_err());
    }
}
