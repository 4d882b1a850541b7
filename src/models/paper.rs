//! 试卷结构模型
//!
//! `PaperConfig` → `PaperPart` → `Question` → `SubQuestion`
//!
//! - 有小题的题目，分值始终等于小题分值之和（每次修改小题后重新汇总）
//! - 小题标签始终是连续的 a, b, c ...（增删后重新编号）
//! - 校验只报告问题，从不自动修正分值

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// 小题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub id: String,
    pub label: String,
    pub marks: u32,
}

/// 题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// 显示标签，如 "Q1"
    pub label: String,
    /// 有小题时为派生值
    pub marks: u32,
    pub has_sub_questions: bool,
    #[serde(default)]
    pub sub_questions: Vec<SubQuestion>,
    /// id 由规范化生成，来源数据中没有 id，合并时不参与 id 匹配
    #[serde(default, skip_serializing)]
    pub synthetic_id: bool,
}

/// 试卷分卷（如 "Paper I"）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperPart {
    pub id: String,
    pub name: String,
    pub total_marks: u32,
    pub main_questions_count: u32,
    /// 0 表示全部必答
    pub required_questions_count: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
    /// 同 `Question::synthetic_id`
    #[serde(default, skip_serializing)]
    pub synthetic_id: bool,
}

/// 一次评测会话的完整试卷配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperConfig {
    pub parts: Vec<PaperPart>,
}

/// 生成第 `index` 个小题标签：a, b, ..., z, aa, ab, ...
pub fn sub_question_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push((b'a' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    label.iter().rev().collect()
}

/// 分值求和，超出 u32 范围时取上限
fn saturating_sum(marks: impl Iterator<Item = u32>) -> u32 {
    marks.fold(0u32, |acc, m| acc.saturating_add(m))
}

impl SubQuestion {
    pub fn new(label: impl Into<String>, marks: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            marks,
        }
    }
}

impl Question {
    pub fn new(label: impl Into<String>, marks: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            marks,
            has_sub_questions: false,
            sub_questions: Vec::new(),
            synthetic_id: false,
        }
    }

    /// 修改题目分值（仅限无小题的题目）
    pub fn set_marks(&mut self, marks: u32) -> Result<(), ValidationError> {
        if self.has_sub_questions {
            return Err(ValidationError::MarksDerived {
                label: self.label.clone(),
            });
        }
        self.marks = marks;
        Ok(())
    }

    /// 切换到小题模式
    ///
    /// 没有小题时自动创建一个承接原分值的小题 "a"。
    pub fn enable_sub_questions(&mut self) {
        if self.has_sub_questions {
            return;
        }
        self.has_sub_questions = true;
        if self.sub_questions.is_empty() {
            self.sub_questions
                .push(SubQuestion::new(sub_question_label(0), self.marks));
        }
        self.relabel_and_rollup();
    }

    /// 关闭小题模式，分值保留为当前汇总值
    pub fn disable_sub_questions(&mut self) {
        self.has_sub_questions = false;
        self.sub_questions.clear();
    }

    pub fn add_sub_question(&mut self, marks: u32) {
        self.has_sub_questions = true;
        let label = sub_question_label(self.sub_questions.len());
        self.sub_questions.push(SubQuestion::new(label, marks));
        self.relabel_and_rollup();
    }

    pub fn remove_sub_question(&mut self, index: usize) -> Result<SubQuestion, ValidationError> {
        if index >= self.sub_questions.len() {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: self.sub_questions.len(),
            });
        }
        let removed = self.sub_questions.remove(index);
        self.relabel_and_rollup();
        Ok(removed)
    }

    pub fn set_sub_question_marks(&mut self, index: usize, marks: u32) -> Result<(), ValidationError> {
        let len = self.sub_questions.len();
        let sub = self
            .sub_questions
            .get_mut(index)
            .ok_or(ValidationError::IndexOutOfRange { index, len })?;
        sub.marks = marks;
        self.relabel_and_rollup();
        Ok(())
    }

    /// 小题重新编号并汇总分值
    pub fn relabel_and_rollup(&mut self) {
        for (i, sub) in self.sub_questions.iter_mut().enumerate() {
            sub.label = sub_question_label(i);
        }
        if self.has_sub_questions {
            self.marks = saturating_sum(self.sub_questions.iter().map(|s| s.marks));
        }
    }
}

impl PaperPart {
    pub fn new(name: impl Into<String>, total_marks: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            total_marks,
            main_questions_count: 0,
            required_questions_count: 0,
            questions: Vec::new(),
            synthetic_id: false,
        }
    }

    /// 追加一道题，标签为 Q{n}
    pub fn add_question(&mut self, marks: u32) -> &mut Question {
        let label = format!("Q{}", self.questions.len() + 1);
        self.questions.push(Question::new(label, marks));
        self.main_questions_count = self.main_questions_count.max(self.questions.len() as u32);
        let last = self.questions.len() - 1;
        &mut self.questions[last]
    }

    pub fn remove_question(&mut self, index: usize) -> Result<Question, ValidationError> {
        if index >= self.questions.len() {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        Ok(self.questions.remove(index))
    }

    /// 是否为"任选 N 题"的分卷
    pub fn is_choose_any(&self) -> bool {
        self.required_questions_count > 0
            && (self.required_questions_count as usize) < self.questions.len()
    }

    pub fn questions_marks_sum(&self) -> u32 {
        saturating_sum(self.questions.iter().map(|q| q.marks))
    }

    /// 校验分卷分值
    ///
    /// - 任选题：所有题目分值相同，且 每题分值 × 必答数 == 总分
    /// - 其他：题目分值之和 == 总分
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_choose_any() {
            let first = self.questions[0].marks;
            if self.questions.iter().any(|q| q.marks != first) {
                return Err(ValidationError::Uniformity {
                    part: self.name.clone(),
                    required: self.required_questions_count,
                });
            }
            let actual = u64::from(first) * u64::from(self.required_questions_count);
            if actual != u64::from(self.total_marks) {
                return Err(ValidationError::ChooseAnyTotal {
                    part: self.name.clone(),
                    per_question: first,
                    required: self.required_questions_count,
                    actual: u32::try_from(actual).unwrap_or(u32::MAX),
                    total: self.total_marks,
                });
            }
            return Ok(());
        }

        let sum: u64 = self.questions.iter().map(|q| u64::from(q.marks)).sum();
        if sum != u64::from(self.total_marks) {
            return Err(ValidationError::SumMismatch {
                part: self.name.clone(),
                sum: u32::try_from(sum).unwrap_or(u32::MAX),
                total: self.total_marks,
            });
        }
        Ok(())
    }
}

impl PaperConfig {
    pub fn new(parts: Vec<PaperPart>) -> Self {
        Self { parts }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn add_part(&mut self, name: impl Into<String>, total_marks: u32) -> &mut PaperPart {
        self.parts.push(PaperPart::new(name, total_marks));
        let last = self.parts.len() - 1;
        &mut self.parts[last]
    }

    pub fn remove_part(&mut self, index: usize) -> Result<PaperPart, ValidationError> {
        if index >= self.parts.len() {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: self.parts.len(),
            });
        }
        Ok(self.parts.remove(index))
    }

    pub fn total_marks(&self) -> u32 {
        saturating_sum(self.parts.iter().map(|p| p.total_marks))
    }

    /// 校验全部分卷，返回所有问题（为空表示可以确认）
    pub fn validate(&self) -> Vec<ValidationError> {
        if self.parts.is_empty() {
            return vec![ValidationError::EmptyConfig];
        }
        self.parts
            .iter()
            .filter_map(|part| part.validate().err())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choose_any_part() -> PaperPart {
        let mut part = PaperPart::new("Paper II", 30);
        for _ in 0..5 {
            part.add_question(10);
        }
        part.required_questions_count = 3;
        part
    }

    #[test]
    fn test_sub_question_labels() {
        assert_eq!(sub_question_label(0), "a");
        assert_eq!(sub_question_label(25), "z");
        assert_eq!(sub_question_label(26), "aa");
        assert_eq!(sub_question_label(27), "ab");
    }

    #[test]
    fn test_sub_question_rollup_on_every_edit() {
        let mut q = Question::new("Q1", 0);
        q.add_sub_question(3);
        q.add_sub_question(4);
        assert!(q.has_sub_questions);
        assert_eq!(q.marks, 7);

        q.set_sub_question_marks(0, 5).unwrap();
        assert_eq!(q.marks, 9);

        q.remove_sub_question(1).unwrap();
        assert_eq!(q.marks, 5);
        assert!(q.set_marks(20).is_err());
    }

    #[test]
    fn test_relabel_after_removal_has_no_gaps() {
        for n in 1..=6usize {
            for k in 0..n {
                let mut q = Question::new("Q1", 0);
                for _ in 0..n {
                    q.add_sub_question(1);
                }
                q.remove_sub_question(k).unwrap();
                let labels: Vec<_> = q.sub_questions.iter().map(|s| s.label.clone()).collect();
                let expected: Vec<_> = (0..n - 1).map(sub_question_label).collect();
                assert_eq!(labels, expected, "n={} k={}", n, k);
                assert_eq!(q.marks, (n - 1) as u32);
            }
        }
    }

    #[test]
    fn test_enable_sub_questions_keeps_marks() {
        let mut q = Question::new("Q2", 8);
        q.enable_sub_questions();
        assert_eq!(q.sub_questions.len(), 1);
        assert_eq!(q.sub_questions[0].label, "a");
        assert_eq!(q.marks, 8);

        q.disable_sub_questions();
        assert!(!q.has_sub_questions);
        assert!(q.set_marks(12).is_ok());
    }

    #[test]
    fn test_choose_any_validation() {
        let mut part = choose_any_part();
        assert!(part.is_choose_any());
        assert_eq!(part.validate(), Ok(()));

        part.questions[2].set_marks(15).unwrap();
        assert!(matches!(
            part.validate(),
            Err(ValidationError::Uniformity { required: 3, .. })
        ));
    }

    #[test]
    fn test_choose_any_total_mismatch() {
        let mut part = choose_any_part();
        part.total_marks = 40;
        assert!(matches!(
            part.validate(),
            Err(ValidationError::ChooseAnyTotal { actual: 30, total: 40, .. })
        ));
    }

    #[test]
    fn test_sum_validation_is_not_auto_repaired() {
        let mut part = PaperPart::new("Paper I", 50);
        part.add_question(20);
        part.add_question(20);
        assert_eq!(
            part.validate(),
            Err(ValidationError::SumMismatch {
                part: "Paper I".to_string(),
                sum: 40,
                total: 50
            })
        );
        assert_eq!(part.total_marks, 50);

        // 必答数等于题目数时按求和校验
        part.required_questions_count = 2;
        assert!(!part.is_choose_any());
        part.questions[1].set_marks(30).unwrap();
        assert_eq!(part.validate(), Ok(()));
    }

    #[test]
    fn test_config_validation_collects_all_parts() {
        let mut config = PaperConfig::default();
        assert_eq!(config.validate(), vec![ValidationError::EmptyConfig]);

        config.add_part("A", 10).add_question(5);
        config.add_part("B", 10).add_question(10);
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(config.total_marks(), 20);

        config.remove_part(0).unwrap();
        assert!(config.validate().is_empty());
        assert!(config.remove_part(3).is_err());
    }

    #[test]
    fn test_huge_marks_saturate_instead_of_overflowing() {
        let mut q = Question::new("Q1", 0);
        q.add_sub_question(4_000_000_000);
        q.add_sub_question(4_000_000_000);
        assert_eq!(q.marks, u32::MAX);

        // 饱和后的汇总值不能让校验误判为通过
        let mut part = PaperPart::new("Paper I", u32::MAX);
        part.add_question(u32::MAX);
        part.add_question(1);
        assert!(matches!(
            part.validate(),
            Err(ValidationError::SumMismatch { sum: u32::MAX, .. })
        ));
        assert_eq!(part.questions_marks_sum(), u32::MAX);

        let mut any = PaperPart::new("Paper II", u32::MAX);
        any.add_question(3_000_000_000);
        any.add_question(3_000_000_000);
        any.add_question(3_000_000_000);
        any.required_questions_count = 2;
        assert!(matches!(
            any.validate(),
            Err(ValidationError::ChooseAnyTotal { actual: u32::MAX, .. })
        ));

        let mut config = PaperConfig::default();
        config.add_part("A", u32::MAX);
        config.add_part("B", 10);
        assert_eq!(config.total_marks(), u32::MAX);
    }
}
