//! 试卷结构规范化 - 业务能力层（纯函数）
//!
//! 后端会以三种形状返回试卷结构：
//!
//! 1. paper-config：嵌套的分卷配置（总分、题数、任选规则）
//! 2. question-structure：按分卷分组的题目结构
//! 3. 扁平题目列表：没有分卷信息，只有 `question_number` / `max_marks` 等
//!
//! 本模块把它们统一转换为 `PaperPart → Question → SubQuestion`，
//! 并把 paper-config（权威的总分/题数）与 question-structure（更细的分值分配）合并。
//!
//! 任何无法识别的形状都降级为空列表，不返回错误。

use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use tracing::debug;

use crate::models::{sub_question_label, PaperPart, Question, SubQuestion};
use crate::utils::fields::{
    array_field, bool_field, resolve, string_field, u32_field,
};

// ========== 候选字段名（按优先级排列） ==========

const PART_LIST_KEYS: &[&str] = &[
    "paper_parts",
    "paperParts",
    "parts",
    "papers",
    "sections",
];
const STRUCTURE_LIST_KEYS: &[&str] = &["question_structure", "questionStructure", "structure"];
const WRAPPER_KEYS: &[&str] = &["data", "result", "paper_config", "paperConfig", "config"];

const PART_ID_KEYS: &[&str] = &["id", "part_id", "partId"];
const PART_NAME_KEYS: &[&str] = &["paper_part", "paperPart", "name", "title", "part_name", "partName"];
const PART_TOTAL_KEYS: &[&str] = &["total_marks", "totalMarks", "max_marks", "maxMarks", "marks"];
const PART_MAIN_COUNT_KEYS: &[&str] = &[
    "main_questions_count",
    "mainQuestionsCount",
    "total_questions",
    "totalQuestions",
    "question_count",
    "questionCount",
    "num_questions",
];
const PART_REQUIRED_KEYS: &[&str] = &[
    "required_questions_count",
    "requiredQuestionsCount",
    "required_questions",
    "requiredQuestions",
    "questions_to_answer",
];
const SELECTION_RULE_KEYS: &[&str] = &["selection_rules", "selectionRules"];
const CHOOSE_ANY_KEYS: &[&str] = &["choose_any", "chooseAny"];

const QUESTION_LIST_KEYS: &[&str] = &["questions", "question_list", "questionList", "items"];
const QUESTION_ID_KEYS: &[&str] = &["id", "question_id", "questionId"];
const QUESTION_LABEL_KEYS: &[&str] = &[
    "label",
    "question_number",
    "questionNumber",
    "question_no",
    "number",
    "question_label",
    "questionLabel",
    "name",
];
const QUESTION_MARKS_KEYS: &[&str] = &["marks", "max_marks", "maxMarks", "total_marks", "totalMarks", "score"];
const HAS_SUB_KEYS: &[&str] = &["has_sub_questions", "hasSubQuestions"];
const SUB_LIST_KEYS: &[&str] = &["sub_questions", "subQuestions", "subquestions", "children"];
const SUB_ID_KEYS: &[&str] = &["id", "sub_question_id", "subQuestionId"];

/// 扁平题目列表的识别字段
const FLAT_MARKER_KEYS: &[&str] = &["question_number", "question_text", "max_marks"];

fn digits_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

/// 名称/标签比较用的规范化：忽略大小写，连续空白折叠为一个空格
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 提取题号中的数字用于排序
fn question_number(label: &str) -> Option<u64> {
    digits_regex()?
        .find(label)
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

/// 纯数字题号统一显示为 Q{n}
fn format_label(raw: &str) -> String {
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("Q{}", raw)
    } else {
        raw.to_string()
    }
}

// ========== 形状定位 ==========

/// 在 payload 中定位列表（最多向下两层包装）
fn locate_list<'a>(payload: &'a JsonValue, list_keys: &[&str], depth: usize) -> Option<&'a [JsonValue]> {
    if let Some(list) = payload.as_array() {
        return Some(list.as_slice());
    }
    if !payload.is_object() {
        return None;
    }
    if let Some(list) = array_field(payload, list_keys) {
        return Some(list);
    }
    if depth == 0 {
        return None;
    }
    list_keys
        .iter()
        .chain(WRAPPER_KEYS.iter())
        .filter_map(|key| payload.get(*key))
        .filter(|v| v.is_object() || v.is_array())
        .find_map(|inner| locate_list(inner, list_keys, depth - 1))
}

fn is_flat_question_list(list: &[JsonValue]) -> bool {
    list.first()
        .and_then(|first| first.as_object())
        .is_some_and(|obj| FLAT_MARKER_KEYS.iter().any(|k| obj.contains_key(*k)))
}

/// 列表元素自身带题目列表时视为分卷列表
fn is_part_list(list: &[JsonValue]) -> bool {
    list.first()
        .is_some_and(|first| array_field(first, QUESTION_LIST_KEYS).is_some())
}

// ========== 单项解析 ==========

fn parse_sub_question(value: &JsonValue, question_id: &str, index: usize) -> SubQuestion {
    let label = sub_question_label(index);
    SubQuestion {
        id: string_field(value, SUB_ID_KEYS)
            .unwrap_or_else(|| format!("{}-{}", question_id, label)),
        label,
        marks: u32_field(value, QUESTION_MARKS_KEYS, 0),
    }
}

fn parse_question(value: &JsonValue, id_prefix: &str, index: usize) -> Question {
    let source_id = string_field(value, QUESTION_ID_KEYS);
    let synthetic_id = source_id.is_none();
    let id = source_id.unwrap_or_else(|| format!("{}-q{}", id_prefix, index));
    let label = string_field(value, QUESTION_LABEL_KEYS)
        .map(|raw| format_label(&raw))
        .unwrap_or_else(|| format!("Q{}", index + 1));

    let sub_questions: Vec<SubQuestion> = array_field(value, SUB_LIST_KEYS)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, sub)| parse_sub_question(sub, &id, i))
        .collect();

    let has_sub_questions =
        bool_field(value, HAS_SUB_KEYS).unwrap_or(!sub_questions.is_empty()) && !sub_questions.is_empty();

    let mut question = Question {
        id,
        label,
        marks: u32_field(value, QUESTION_MARKS_KEYS, 0),
        has_sub_questions,
        sub_questions,
        synthetic_id,
    };
    if !question.has_sub_questions {
        question.sub_questions.clear();
    }
    question.relabel_and_rollup();
    question
}

fn parse_part(value: &JsonValue, index: usize) -> PaperPart {
    let source_id = string_field(value, PART_ID_KEYS);
    let synthetic_id = source_id.is_none();
    let id = source_id.unwrap_or_else(|| format!("ocr-part-{}", index));

    let mut required = u32_field(value, PART_REQUIRED_KEYS, 0);
    if let Some(rules) = resolve(value, SELECTION_RULE_KEYS) {
        let choose_any = u32_field(rules, CHOOSE_ANY_KEYS, 0);
        if choose_any > 0 {
            required = choose_any;
        }
    }

    let questions = array_field(value, QUESTION_LIST_KEYS)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(j, q)| parse_question(q, &id, j))
        .collect();

    PaperPart {
        name: string_field(value, PART_NAME_KEYS).unwrap_or_else(|| format!("Part {}", index + 1)),
        total_marks: u32_field(value, PART_TOTAL_KEYS, 0),
        main_questions_count: u32_field(value, PART_MAIN_COUNT_KEYS, 0),
        required_questions_count: required,
        questions,
        id,
        synthetic_id,
    }
}

fn parse_parts(list: &[JsonValue]) -> Vec<PaperPart> {
    list.iter()
        .enumerate()
        .filter(|(_, v)| v.is_object())
        .map(|(i, v)| parse_part(v, i))
        .collect()
}

// ========== 对外接口 ==========

/// 规范化 paper-config 返回值
pub fn normalize_paper_config(payload: &JsonValue) -> Vec<PaperPart> {
    if let Some(list) = locate_list(payload, PART_LIST_KEYS, 2) {
        return parse_parts(list);
    }
    // 只有一个分卷、直接返回分卷对象的情况
    if payload.is_object() && array_field(payload, QUESTION_LIST_KEYS).is_some() {
        return vec![parse_part(payload, 0)];
    }
    debug!("无法识别的 paper-config 结构，返回空配置");
    Vec::new()
}

/// 规范化 question-structure 返回值
///
/// 扁平题目列表会按题号排序后，按 `paper_config_parts` 中各分卷的
/// `main_questions_count` 切分；没有分卷信息时放入单个分卷。
pub fn normalize_question_structure(
    payload: &JsonValue,
    paper_config_parts: Option<&[PaperPart]>,
) -> Vec<PaperPart> {
    let list_keys: Vec<&str> = STRUCTURE_LIST_KEYS
        .iter()
        .chain(QUESTION_LIST_KEYS.iter())
        .chain(PART_LIST_KEYS.iter())
        .copied()
        .collect();

    let Some(list) = locate_list(payload, &list_keys, 2) else {
        debug!("无法识别的 question-structure 结构，返回空配置");
        return Vec::new();
    };

    // 单个分卷对象：`questions` 是该分卷的题目而不是分卷列表
    if payload.is_object()
        && array_field(payload, QUESTION_LIST_KEYS).is_some_and(|q| std::ptr::eq(q, list))
        && !is_flat_question_list(list)
        && !is_part_list(list)
    {
        return vec![parse_part(payload, 0)];
    }

    if !is_flat_question_list(list) {
        return parse_parts(list);
    }

    let mut questions: Vec<Question> = list
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_object())
        .map(|(i, v)| parse_question(v, "flat", i))
        .collect();
    questions.sort_by_key(|q| question_number(&q.label).unwrap_or(u64::MAX));

    match paper_config_parts {
        Some(parts) if !parts.is_empty() => split_flat_questions_into_parts(questions, parts),
        _ => {
            let mut part = PaperPart {
                id: "ocr-part-0".to_string(),
                name: "Part 1".to_string(),
                total_marks: 0,
                main_questions_count: questions.len() as u32,
                required_questions_count: 0,
                questions,
                synthetic_id: true,
            };
            part.total_marks = part.questions_marks_sum();
            vec![part]
        }
    }
}

/// 按各分卷的 `main_questions_count` 依次切分扁平题目列表
///
/// 多出来的题目全部归入最后一个分卷，不会丢题。
pub fn split_flat_questions_into_parts(questions: Vec<Question>, parts: &[PaperPart]) -> Vec<PaperPart> {
    if parts.is_empty() {
        return Vec::new();
    }

    let mut remaining = questions.into_iter();
    let last = parts.len() - 1;

    parts
        .iter()
        .enumerate()
        .map(|(i, base)| {
            let taken: Vec<Question> = if i == last {
                remaining.by_ref().collect()
            } else {
                remaining
                    .by_ref()
                    .take(base.main_questions_count as usize)
                    .collect()
            };
            PaperPart {
                questions: taken,
                ..base.clone()
            }
        })
        .collect()
}

/// 合并 paper-config 与 question-structure
///
/// - 分卷匹配：id → 规范化名称 → 下标
/// - 题目匹配：id → 规范化标签；匹配到则采用结构中的分值和小题
/// - 总分/题数/必答数以 paper-config 为准，为 0 时才使用结构中的值
/// - 输出顺序与 paper-config 一致
pub fn merge_paper_config_with_question_structure(
    paper_config_parts: &[PaperPart],
    question_structure_parts: &[PaperPart],
) -> Vec<PaperPart> {
    if paper_config_parts.is_empty() {
        return question_structure_parts.to_vec();
    }

    paper_config_parts
        .iter()
        .enumerate()
        .map(|(index, base)| {
            let Some(structure) = find_structure_part(base, index, question_structure_parts) else {
                return base.clone();
            };

            let questions = if base.questions.is_empty() {
                structure.questions.clone()
            } else {
                base.questions
                    .iter()
                    .map(|q| merge_question(q, &structure.questions))
                    .collect()
            };

            PaperPart {
                id: base.id.clone(),
                name: base.name.clone(),
                total_marks: non_zero_or(base.total_marks, structure.total_marks),
                main_questions_count: non_zero_or(
                    base.main_questions_count,
                    structure.main_questions_count,
                ),
                required_questions_count: non_zero_or(
                    base.required_questions_count,
                    structure.required_questions_count,
                ),
                questions,
                synthetic_id: base.synthetic_id,
            }
        })
        .collect()
}

fn non_zero_or(primary: u32, fallback: u32) -> u32 {
    if primary > 0 {
        primary
    } else {
        fallback
    }
}

/// 只有双方的 id 都来自源数据时才按 id 匹配
fn same_source_id(a: &str, a_synthetic: bool, b: &str, b_synthetic: bool) -> bool {
    !a_synthetic && !b_synthetic && a == b
}

fn find_structure_part<'a>(
    base: &PaperPart,
    index: usize,
    candidates: &'a [PaperPart],
) -> Option<&'a PaperPart> {
    let name = normalize_key(&base.name);
    candidates
        .iter()
        .find(|p| same_source_id(&p.id, p.synthetic_id, &base.id, base.synthetic_id))
        .or_else(|| candidates.iter().find(|p| normalize_key(&p.name) == name))
        .or_else(|| candidates.get(index))
}

fn merge_question(base: &Question, candidates: &[Question]) -> Question {
    let label = normalize_key(&base.label);
    let matched = candidates
        .iter()
        .find(|q| same_source_id(&q.id, q.synthetic_id, &base.id, base.synthetic_id))
        .or_else(|| candidates.iter().find(|q| normalize_key(&q.label) == label));

    match matched {
        Some(structure) => {
            let mut merged = Question {
                id: base.id.clone(),
                label: base.label.clone(),
                marks: structure.marks,
                has_sub_questions: structure.has_sub_questions,
                sub_questions: structure.sub_questions.clone(),
                synthetic_id: base.synthetic_id,
            };
            merged.relabel_and_rollup();
            merged
        }
        None => base.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counts_only(counts: &[u32]) -> Vec<PaperPart> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| PaperPart {
                id: format!("p{}", i),
                name: format!("Paper {}", i + 1),
                total_marks: 0,
                main_questions_count: c,
                required_questions_count: 0,
                questions: Vec::new(),
                synthetic_id: false,
            })
            .collect()
    }

    #[test]
    fn test_normalize_paper_config_with_alternate_keys() {
        let payload = json!({
            "data": {
                "paperParts": [
                    {
                        "paperPart": "Paper I",
                        "totalMarks": "50",
                        "mainQuestionsCount": 5,
                        "requiredQuestionsCount": 2,
                        "selection_rules": { "choose_any": 3 }
                    },
                    { "title": "Paper II", "total_marks": "oops" }
                ]
            }
        });
        let parts = normalize_paper_config(&payload);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].id, "ocr-part-0");
        assert_eq!(parts[0].name, "Paper I");
        assert_eq!(parts[0].total_marks, 50);
        assert_eq!(parts[0].main_questions_count, 5);
        assert_eq!(parts[0].required_questions_count, 3);
        assert_eq!(parts[1].id, "ocr-part-1");
        assert_eq!(parts[1].total_marks, 0);
    }

    #[test]
    fn test_choose_any_zero_does_not_override() {
        let payload = json!([{ "name": "A", "required_questions": 4, "selectionRules": { "chooseAny": 0 } }]);
        let parts = normalize_paper_config(&payload);
        assert_eq!(parts[0].required_questions_count, 4);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let payload = json!({
            "parts": [{
                "name": "Paper I",
                "questions": [
                    { "label": "1", "marks": 10 },
                    { "label": "Q2", "sub_questions": [{ "marks": 3 }, { "marks": 4 }] }
                ]
            }]
        });
        let first = normalize_paper_config(&payload);
        let second = normalize_paper_config(&payload);
        assert_eq!(first, second);

        let q2 = &first[0].questions[1];
        assert!(q2.has_sub_questions);
        assert_eq!(q2.marks, 7);
        assert_eq!(q2.sub_questions[1].label, "b");
        assert_eq!(q2.sub_questions[1].id, "ocr-part-0-q1-b");
    }

    #[test]
    fn test_malformed_payloads_degrade_to_empty() {
        assert!(normalize_paper_config(&json!(null)).is_empty());
        assert!(normalize_paper_config(&json!("text")).is_empty());
        assert!(normalize_paper_config(&json!({ "unexpected": 1 })).is_empty());
        assert!(normalize_question_structure(&json!(42), None).is_empty());
        assert!(normalize_paper_config(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_flat_list_split_across_parts() {
        let payload = json!([
            { "question_number": 2, "max_marks": 20 },
            { "question_number": 1, "max_marks": 10 }
        ]);
        let parts = normalize_question_structure(&payload, Some(&counts_only(&[1, 1])));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].questions.len(), 1);
        assert_eq!(parts[0].questions[0].marks, 10);
        assert_eq!(parts[0].questions[0].label, "Q1");
        assert_eq!(parts[1].questions.len(), 1);
        assert_eq!(parts[1].questions[0].marks, 20);
    }

    #[test]
    fn test_flat_list_sorted_numerically() {
        let payload = json!({ "questions": [
            { "question_number": "Q10", "max_marks": 1 },
            { "question_number": "Q2", "max_marks": 2 },
            { "question_number": "Q1", "max_marks": 3 }
        ]});
        let parts = normalize_question_structure(&payload, None);
        let labels: Vec<_> = parts[0].questions.iter().map(|q| q.label.as_str()).collect();
        assert_eq!(labels, vec!["Q1", "Q2", "Q10"]);
        assert_eq!(parts[0].total_marks, 6);
    }

    #[test]
    fn test_split_never_drops_questions() {
        let partitions: &[&[u32]] = &[&[0, 0, 0], &[1, 1], &[5], &[2, 0, 1], &[0, 7], &[3, 3, 3]];
        for counts in partitions {
            for n in 0..8usize {
                let questions: Vec<Question> =
                    (0..n).map(|i| Question::new(format!("Q{}", i + 1), 1)).collect();
                let parts = split_flat_questions_into_parts(questions, &counts_only(counts));
                let total: usize = parts.iter().map(|p| p.questions.len()).sum();
                assert_eq!(total, n, "counts={:?} n={}", counts, n);
                assert_eq!(parts.len(), counts.len());
            }
        }
    }

    #[test]
    fn test_all_zero_counts_go_to_last_part() {
        let questions: Vec<Question> = (0..3).map(|i| Question::new(format!("Q{}", i + 1), 1)).collect();
        let parts = split_flat_questions_into_parts(questions, &counts_only(&[0, 0]));
        assert!(parts[0].questions.is_empty());
        assert_eq!(parts[1].questions.len(), 3);
    }

    #[test]
    fn test_grouped_structure_uses_field_fallbacks() {
        let payload = json!({ "question_structure": [
            { "part_name": "Paper I", "questions": [{ "questionNumber": 1, "maxMarks": 15 }] }
        ]});
        let parts = normalize_question_structure(&payload, None);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Paper I");
        assert_eq!(parts[0].questions[0].marks, 15);
    }

    #[test]
    fn test_merge_prefers_structure_marks_and_base_totals() {
        let base = normalize_paper_config(&json!([
            {
                "id": "p1",
                "name": "Paper  I",
                "total_marks": 30,
                "main_questions_count": 2,
                "questions": [{ "label": "Q1", "marks": 0 }, { "label": "Q2", "marks": 0 }]
            },
            { "id": "p2", "name": "Paper II", "total_marks": 0, "main_questions_count": 1 }
        ]));
        let structure = normalize_question_structure(
            &json!([
                {
                    "name": "paper ii",
                    "total_marks": 20,
                    "questions": [{ "label": "1", "marks": 20 }]
                },
                {
                    "name": "PAPER I",
                    "total_marks": 99,
                    "questions": [
                        { "label": "q2", "sub_questions": [{ "marks": 5 }, { "marks": 5 }] },
                        { "label": " q1 ", "marks": 20 }
                    ]
                }
            ]),
            None,
        );

        let merged = merge_paper_config_with_question_structure(&base, &structure);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "Paper  I");
        assert_eq!(merged[0].total_marks, 30);
        assert_eq!(merged[0].questions[0].label, "Q1");
        assert_eq!(merged[0].questions[0].marks, 20);
        assert!(merged[0].questions[1].has_sub_questions);
        assert_eq!(merged[0].questions[1].marks, 10);
        assert!(merged[0].validate().is_ok());

        // 基础配置没有题目时直接采用结构中的题目；总分为 0 时采用结构值
        assert_eq!(merged[1].total_marks, 20);
        assert_eq!(merged[1].questions.len(), 1);
        assert_eq!(merged[1].main_questions_count, 1);
    }

    #[test]
    fn test_merge_falls_back_to_index_and_keeps_unmatched() {
        let base = vec![PaperPart {
            id: "a".to_string(),
            name: "Section A".to_string(),
            total_marks: 10,
            main_questions_count: 1,
            required_questions_count: 0,
            questions: vec![Question::new("Q1", 10)],
            synthetic_id: false,
        }];
        let structure = vec![PaperPart {
            id: "zzz".to_string(),
            name: "Unrelated".to_string(),
            total_marks: 0,
            main_questions_count: 0,
            required_questions_count: 0,
            questions: vec![Question::new("Q9", 3)],
            synthetic_id: false,
        }];
        let merged = merge_paper_config_with_question_structure(&base, &structure);
        assert_eq!(merged[0].questions[0].marks, 10);
        assert_eq!(merged[0].id, "a");

        assert_eq!(merge_paper_config_with_question_structure(&[], &structure), structure);
    }

    #[test]
    fn test_merge_without_ids_matches_parts_by_name() {
        let base = normalize_paper_config(&json!([
            { "name": "Paper I", "total_marks": 10, "main_questions_count": 1 },
            { "name": "Paper II", "total_marks": 20, "main_questions_count": 1 }
        ]));
        let structure = normalize_question_structure(
            &json!([
                { "name": "Paper II", "questions": [{ "label": "Q1", "marks": 20 }] },
                { "name": "Paper I", "questions": [{ "label": "Q1", "marks": 10 }] }
            ]),
            None,
        );
        assert_eq!(base[0].id, structure[0].id);

        let merged = merge_paper_config_with_question_structure(&base, &structure);
        assert_eq!(merged[0].name, "Paper I");
        assert_eq!(merged[0].questions[0].marks, 10);
        assert_eq!(merged[1].name, "Paper II");
        assert_eq!(merged[1].questions[0].marks, 20);
        assert!(merged.iter().all(|p| p.validate().is_ok()));
    }

    #[test]
    fn test_merge_without_ids_matches_questions_by_label() {
        let base = normalize_paper_config(&json!({ "parts": [{
            "name": "Paper I",
            "total_marks": 30,
            "questions": [{ "label": "Q1" }, { "label": "Q2" }]
        }]}));
        let structure = normalize_question_structure(
            &json!({ "parts": [{
                "name": "Paper I",
                "questions": [{ "label": "Q2", "marks": 20 }, { "label": "Q1", "marks": 10 }]
            }]}),
            None,
        );

        let merged = merge_paper_config_with_question_structure(&base, &structure);
        let marks: Vec<_> = merged[0]
            .questions
            .iter()
            .map(|q| (q.label.as_str(), q.marks))
            .collect();
        assert_eq!(marks, vec![("Q1", 10), ("Q2", 20)]);
    }

    #[test]
    fn test_merge_still_matches_source_ids() {
        let base = normalize_paper_config(&json!([
            { "id": "x", "name": "First", "total_marks": 5 },
            { "id": "y", "name": "Second", "total_marks": 7 }
        ]));
        let structure = normalize_question_structure(
            &json!([
                { "id": "y", "name": "renamed", "questions": [{ "label": "Q1", "marks": 7 }] },
                { "id": "x", "name": "also renamed", "questions": [{ "label": "Q1", "marks": 5 }] }
            ]),
            None,
        );
        let merged = merge_paper_config_with_question_structure(&base, &structure);
        assert_eq!(merged[0].questions[0].marks, 5);
        assert_eq!(merged[1].questions[0].marks, 7);
    }

    #[test]
    fn test_single_grouped_part_in_question_structure() {
        let payload = json!({
            "name": "Paper I",
            "total_marks": 10,
            "questions": [{ "label": "Q1", "marks": 4 }, { "label": "Q2", "marks": 6 }]
        });
        let parts = normalize_question_structure(&payload, None);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Paper I");
        assert_eq!(parts[0].total_marks, 10);
        let marks: Vec<_> = parts[0].questions.iter().map(|q| q.marks).collect();
        assert_eq!(marks, vec![4, 6]);
        assert_eq!(parts, normalize_paper_config(&payload));
    }

    #[test]
    fn test_huge_sub_question_marks_do_not_panic() {
        let parts = normalize_paper_config(&json!([{
            "name": "Paper I",
            "questions": [{
                "label": "Q1",
                "sub_questions": [{ "marks": 4000000000u64 }, { "marks": 4000000000u64 }]
            }]
        }]));
        assert_eq!(parts[0].questions[0].marks, u32::MAX);
        assert!(parts[0].validate().is_err());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Paper   I "), "paper i");
        assert_eq!(normalize_key("Q1"), normalize_key("q1"));
    }
}
