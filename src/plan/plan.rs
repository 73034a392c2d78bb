//! 计划数据结构
//!
//! 计划是结构化状态的唯一事实来源：标题、有序步骤、每步状态与备注。
//! 文本渲染只用于展示与注入 prompt，不参与回读。

use serde::{Deserialize, Serialize};

/// 单个步骤的执行状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Blocked => "blocked",
        }
    }

    /// 渲染用的状态记号
    pub fn marker(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
            StepStatus::Blocked => "[!]",
        }
    }

    /// 是否属于可被选为当前执行目标的状态
    pub fn is_active(&self) -> bool {
        matches!(self, StepStatus::NotStarted | StepStatus::InProgress)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(StepStatus::NotStarted),
            "in_progress" => Some(StepStatus::InProgress),
            "completed" => Some(StepStatus::Completed),
            "blocked" => Some(StepStatus::Blocked),
            _ => None,
        }
    }
}

/// 计划：步骤文本与状态、备注三个向量长度始终一致
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub title: String,
    steps: Vec<String>,
    step_statuses: Vec<StepStatus>,
    step_notes: Vec<String>,
}

impl Plan {
    pub fn new(id: impl Into<String>, title: impl Into<String>, steps: Vec<String>) -> Self {
        let n = steps.len();
        Self {
            id: id.into(),
            title: title.into(),
            steps,
            step_statuses: vec![StepStatus::default(); n],
            step_notes: vec![String::new(); n],
        }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn statuses(&self) -> &[StepStatus] {
        &self.step_statuses
    }

    pub fn notes(&self) -> &[String] {
        &self.step_notes
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 替换步骤列表；位置与文本都未变的步骤保留原状态与备注
    pub fn set_steps(&mut self, steps: Vec<String>) {
        let mut statuses = vec![StepStatus::default(); steps.len()];
        let mut notes = vec![String::new(); steps.len()];
        for (i, step) in steps.iter().enumerate() {
            if self.steps.get(i) == Some(step) {
                statuses[i] = self.step_statuses[i];
                notes[i] = self.step_notes[i].clone();
            }
        }
        self.steps = steps;
        self.step_statuses = statuses;
        self.step_notes = notes;
    }

    /// 更新单步状态与备注。索引恰好等于当前长度时惰性补位一个空步骤，
    /// 避免执行器领先于计划文本时丢失状态更新；再往后越界报错
    pub fn mark_step(
        &mut self,
        index: usize,
        status: Option<StepStatus>,
        note: Option<String>,
    ) -> Result<(), String> {
        if index > self.steps.len() {
            return Err(format!(
                "Invalid step_index: {index}. Valid indices range from 0 to {}.",
                self.steps.len().saturating_sub(1)
            ));
        }
        if index == self.steps.len() {
            self.steps.push(String::new());
            self.step_statuses.push(StepStatus::default());
            self.step_notes.push(String::new());
        }
        if let Some(status) = status {
            self.step_statuses[index] = status;
        }
        if let Some(note) = note {
            self.step_notes[index] = note;
        }
        Ok(())
    }

    /// 第一个处于活跃状态（未开始或进行中）的步骤
    pub fn first_active_step(&self) -> Option<(usize, &str)> {
        self.step_statuses
            .iter()
            .position(|s| s.is_active())
            .map(|i| (i, self.steps[i].as_str()))
    }

    /// (已完成数, 总数, 完成百分比)
    pub fn progress(&self) -> (usize, usize, f64) {
        let total = self.steps.len();
        let completed = self
            .step_statuses
            .iter()
            .filter(|s| **s == StepStatus::Completed)
            .count();
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        (completed, total, percent)
    }

    /// 展示用文本渲染
    pub fn render(&self) -> String {
        let header = format!("Plan: {} (ID: {})", self.title, self.id);
        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');
        out.push_str(&"=".repeat(header.chars().count()));
        out.push_str("\n\n");

        let (completed, total, percent) = self.progress();
        let in_progress = self
            .step_statuses
            .iter()
            .filter(|s| **s == StepStatus::InProgress)
            .count();
        let blocked = self
            .step_statuses
            .iter()
            .filter(|s| **s == StepStatus::Blocked)
            .count();
        let not_started = self
            .step_statuses
            .iter()
            .filter(|s| **s == StepStatus::NotStarted)
            .count();

        out.push_str(&format!(
            "Progress: {completed}/{total} steps completed ({percent:.1}%)\n"
        ));
        out.push_str(&format!(
            "Status: {completed} completed, {in_progress} in_progress, {blocked} blocked, {not_started} not_started\n\n"
        ));
        out.push_str("Steps:\n");

        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{i}. {} {step}\n", self.step_statuses[i].marker()));
            let note = &self.step_notes[i];
            if !note.is_empty() {
                out.push_str(&format!("  Notes: {note}\n"));
            }
        }
        out
    }
}

/// 从渲染文本里找第一个活跃步骤（测试渲染格式的回读契约用）
pub fn scan_active_step(rendered: &str) -> Option<(usize, String)> {
    let mut in_steps = false;
    for line in rendered.lines() {
        if line == "Steps:" {
            in_steps = true;
            continue;
        }
        if !in_steps {
            continue;
        }
        let Some((index_part, rest)) = line.split_once(". ") else {
            continue;
        };
        let Ok(index) = index_part.trim().parse::<usize>() else {
            continue;
        };
        if rest.starts_with("[ ]") || rest.starts_with("[→]") {
            let text = rest
                .trim_start_matches("[ ]")
                .trim_start_matches("[→]")
                .trim()
                .to_string();
            return Some((index, text));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Plan {
        Plan::new(
            "plan_1",
            "Ship the feature",
            vec![
                "[CODE] Write the parser".to_string(),
                "Test the parser".to_string(),
                "Document usage".to_string(),
            ],
        )
    }

    #[test]
    fn test_vectors_stay_aligned() {
        let mut plan = sample();
        assert_eq!(plan.statuses().len(), plan.len());
        assert_eq!(plan.notes().len(), plan.len());
        plan.set_steps(vec!["only one".to_string()]);
        assert_eq!(plan.statuses().len(), 1);
        assert_eq!(plan.notes().len(), 1);
    }

    #[test]
    fn test_mark_step_validates_index() {
        let mut plan = sample();
        assert!(plan
            .mark_step(0, Some(StepStatus::Completed), None)
            .is_ok());
        assert!(plan.mark_step(4, Some(StepStatus::Completed), None).is_err());
    }

    #[test]
    fn test_mark_step_pads_at_current_length() {
        let mut plan = Plan::new("plan_1", "Short plan", vec!["Do the work".to_string()]);
        plan.mark_step(1, Some(StepStatus::Completed), Some("extra".into()))
            .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.statuses().len(), 2);
        assert_eq!(plan.notes().len(), 2);
        assert_eq!(plan.statuses()[1], StepStatus::Completed);
        assert_eq!(plan.notes()[1], "extra");
        // 只补一位，更远的索引仍然报错
        assert!(plan.mark_step(3, Some(StepStatus::Completed), None).is_err());
    }

    #[test]
    fn test_set_steps_preserves_unchanged_positions() {
        let mut plan = sample();
        plan.mark_step(0, Some(StepStatus::Completed), Some("done".into()))
            .unwrap();
        plan.set_steps(vec![
            "[CODE] Write the parser".to_string(),
            "Different step".to_string(),
        ]);
        assert_eq!(plan.statuses()[0], StepStatus::Completed);
        assert_eq!(plan.notes()[0], "done");
        assert_eq!(plan.statuses()[1], StepStatus::NotStarted);
    }

    #[test]
    fn test_first_active_skips_completed_and_blocked() {
        let mut plan = sample();
        plan.mark_step(0, Some(StepStatus::Completed), None).unwrap();
        plan.mark_step(1, Some(StepStatus::Blocked), None).unwrap();
        let (index, text) = plan.first_active_step().unwrap();
        assert_eq!(index, 2);
        assert_eq!(text, "Document usage");
    }

    #[test]
    fn test_render_scan_round_trip() {
        let mut plan = sample();
        plan.mark_step(0, Some(StepStatus::Completed), None).unwrap();
        let structured = plan.first_active_step().map(|(i, s)| (i, s.to_string()));
        let scanned = scan_active_step(&plan.render());
        assert_eq!(structured, scanned);
        assert_eq!(scanned, Some((1, "Test the parser".to_string())));
    }

    #[test]
    fn test_render_shows_progress_and_notes() {
        let mut plan = sample();
        plan.mark_step(0, Some(StepStatus::Completed), Some("parser ok".into()))
            .unwrap();
        let text = plan.render();
        assert!(text.contains("Progress: 1/3 steps completed (33.3%)"));
        assert!(text.contains("Status: 1 completed, 0 in_progress, 0 blocked, 2 not_started"));
        assert!(text.contains("0. [✓] [CODE] Write the parser"));
        assert!(text.contains("  Notes: parser ok"));
    }
}
