//! Kanban boards with sprint scoring for the board lead and developers.

use crate::config::KanbanConfig;
use crate::error::{LedgerError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

crate::uuid_id!(BoardId);
crate::uuid_id!(PersonId);
crate::uuid_id!(TaskId);

pub const BACKLOG: &str = "Backlog";
const MIN_COMPLEXITY: i32 = 1;
const MAX_COMPLEXITY: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Design,
    Programming,
}

impl FromStr for TaskKind {
    type Err = LedgerError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.to_lowercase().as_str() {
            "diu" | "design" => Ok(TaskKind::Design),
            "programacion" | "programming" => Ok(TaskKind::Programming),
            _ => Err(LedgerError::UnknownTaskKind {
                tag: tag.to_string(),
            }),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Design => write!(f, "design"),
            TaskKind::Programming => write!(f, "programming"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub email: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub developer: PersonId,
    pub started_on: NaiveDate,
    pub ended_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub kind: TaskKind,
    pub complexity: u32,
    pub deadline: NaiveDate,
    pub created_on: NaiveDate,
    pub closed_on: Option<NaiveDate>,
    pub assignments: Vec<Assignment>,
}

impl Task {
    pub fn is_closed(&self) -> bool {
        self.closed_on.is_some()
    }

    pub fn closed_on_time(&self) -> bool {
        self.closed_on.is_some_and(|closed| closed <= self.deadline)
    }

    pub fn current_developer(&self) -> Option<PersonId> {
        self.assignments.last().map(|a| a.developer)
    }

    /// Points the current developer earns when the sprint closes.
    pub fn developer_score(&self) -> u32 {
        match (self.kind, self.closed_on_time()) {
            (TaskKind::Design, true) => 2 * self.complexity,
            (TaskKind::Design, false) => 1,
            (TaskKind::Programming, true) => self.complexity.pow(2),
            (TaskKind::Programming, false) => 0,
        }
    }

    fn end_open_assignment(&mut self, on: NaiveDate) {
        if let Some(open) = self.assignments.last_mut().filter(|a| a.ended_on.is_none()) {
            open.ended_on = Some(on);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    pub title: String,
    pub tasks: Vec<TaskId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub lead: PersonId,
    pub lists: Vec<TaskList>,
    pub sprint_closed: bool,
}

impl Board {
    fn list_mut(&mut self, title: &str) -> &mut TaskList {
        let index = match self.lists.iter().position(|list| list.title == title) {
            Some(index) => index,
            None => {
                self.lists.push(TaskList {
                    title: title.to_string(),
                    tasks: Vec::new(),
                });
                self.lists.len() - 1
            }
        };
        &mut self.lists[index]
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> + '_ {
        self.lists.iter().flat_map(|list| list.tasks.iter())
    }

    pub fn list_of(&self, task_id: &TaskId) -> Option<&str> {
        self.lists
            .iter()
            .find(|list| list.tasks.contains(task_id))
            .map(|list| list.title.as_str())
    }
}

#[derive(Debug, Default)]
pub struct Kanban {
    config: KanbanConfig,
    people: HashMap<PersonId, Person>,
    boards: HashMap<BoardId, Board>,
    board_order: Vec<BoardId>,
    tasks: HashMap<TaskId, Task>,
}

impl Kanban {
    /// Fails with a config error when `config` does not validate.
    pub fn new(config: KanbanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    pub fn register_person(
        &mut self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> PersonId {
        let person = Person {
            id: PersonId::new(),
            name: name.into(),
            email: email.into(),
            score: 0,
        };
        let id = person.id;
        self.people.insert(id, person);
        id
    }

    pub fn person(&self, person_id: &PersonId) -> Result<&Person> {
        self.people
            .get(person_id)
            .ok_or_else(|| LedgerError::PersonNotFound {
                id: person_id.to_string(),
            })
    }

    fn person_mut(&mut self, person_id: &PersonId) -> Result<&mut Person> {
        self.people
            .get_mut(person_id)
            .ok_or_else(|| LedgerError::PersonNotFound {
                id: person_id.to_string(),
            })
    }

    pub fn board(&self, board_id: &BoardId) -> Result<&Board> {
        self.boards
            .get(board_id)
            .ok_or_else(|| LedgerError::BoardNotFound {
                id: board_id.to_string(),
            })
    }

    fn board_mut(&mut self, board_id: &BoardId) -> Result<&mut Board> {
        self.boards
            .get_mut(board_id)
            .ok_or_else(|| LedgerError::BoardNotFound {
                id: board_id.to_string(),
            })
    }

    pub fn task(&self, task_id: &TaskId) -> Result<&Task> {
        self.tasks.get(task_id).ok_or_else(|| LedgerError::TaskNotFound {
            id: task_id.to_string(),
        })
    }

    fn task_mut(&mut self, task_id: &TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| LedgerError::TaskNotFound {
                id: task_id.to_string(),
            })
    }

    /// New board led by `lead`, starting with an empty backlog.
    pub fn create_board(&mut self, title: impl Into<String>, lead: &PersonId) -> Result<BoardId> {
        self.person(lead)?;
        let board = Board {
            id: BoardId::new(),
            title: title.into(),
            lead: *lead,
            lists: vec![TaskList {
                title: BACKLOG.to_string(),
                tasks: Vec::new(),
            }],
            sprint_closed: false,
        };
        let id = board.id;
        self.boards.insert(id, board);
        self.board_order.push(id);
        Ok(id)
    }

    /// Create a task of kind `tag` in the board's backlog. Complexity is
    /// clamped to 1..=5.
    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &mut self,
        board_id: &BoardId,
        title: impl Into<String>,
        description: impl Into<String>,
        complexity: i32,
        deadline: NaiveDate,
        tag: &str,
        today: NaiveDate,
    ) -> Result<TaskId> {
        let kind: TaskKind = tag.parse()?;
        self.board(board_id)?;

        let task = Task {
            id: TaskId::new(),
            title: title.into(),
            description: description.into(),
            kind,
            complexity: complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY).unsigned_abs(),
            deadline,
            created_on: today,
            closed_on: None,
            assignments: Vec::new(),
        };
        let id = task.id;
        self.tasks.insert(id, task);
        self.board_mut(board_id)?.list_mut(BACKLOG).tasks.push(id);
        Ok(id)
    }

    /// Hand the task to `developer`, ending the current assignment.
    pub fn assign_task(
        &mut self,
        task_id: &TaskId,
        developer: &PersonId,
        today: NaiveDate,
    ) -> Result<()> {
        self.person(developer)?;
        let task = self.task_mut(task_id)?;
        if task.is_closed() {
            return Err(LedgerError::TaskAlreadyClosed {
                task: task.title.clone(),
            });
        }
        task.end_open_assignment(today);
        task.assignments.push(Assignment {
            developer: *developer,
            started_on: today,
            ended_on: None,
        });
        Ok(())
    }

    /// Move a task to the list titled `destination`, creating the list when
    /// the board has none by that name.
    pub fn move_task(
        &mut self,
        board_id: &BoardId,
        task_id: &TaskId,
        destination: &str,
    ) -> Result<()> {
        let board = self.board_mut(board_id)?;
        let Some(source) = board
            .lists
            .iter_mut()
            .find(|list| list.tasks.contains(task_id))
        else {
            return Err(LedgerError::TaskNotOnBoard {
                task: task_id.to_string(),
                board: board.title.clone(),
            });
        };
        source.tasks.retain(|id| id != task_id);
        board.list_mut(destination).tasks.push(*task_id);
        Ok(())
    }

    pub fn close_task(&mut self, task_id: &TaskId, today: NaiveDate) -> Result<()> {
        let task = self.task_mut(task_id)?;
        if task.is_closed() {
            return Err(LedgerError::TaskAlreadyClosed {
                task: task.title.clone(),
            });
        }
        task.closed_on = Some(today);
        task.end_open_assignment(today);
        Ok(())
    }

    /// Score the tasks closed within the sprint window. A board's sprint can
    /// only be closed once; later calls return `Ok(false)`.
    pub fn close_sprint(&mut self, board_id: &BoardId, today: NaiveDate) -> Result<bool> {
        let board = self.board_mut(board_id)?;
        if board.sprint_closed {
            return Ok(false);
        }
        board.sprint_closed = true;
        let lead = board.lead;
        let task_ids: Vec<TaskId> = board.task_ids().copied().collect();
        let window_start = today
            .checked_sub_signed(Duration::days(self.config.sprint_window_days))
            .unwrap_or(NaiveDate::MIN);

        let mut lead_points = 0;
        let mut developer_points: Vec<(PersonId, u32)> = Vec::new();
        for task in task_ids.iter().filter_map(|id| self.tasks.get(id)) {
            let Some(closed_on) = task.closed_on else {
                continue;
            };
            if closed_on < window_start {
                continue;
            }
            if task.closed_on_time() {
                lead_points += 1;
            }
            if let Some(developer) = task.current_developer() {
                developer_points.push((developer, task.developer_score()));
            }
        }

        self.person_mut(&lead)?.score += lead_points;
        for (developer, points) in developer_points {
            self.person_mut(&developer)?.score += points;
        }
        info!("Closed sprint on board {} ({} lead points)", board_id, lead_points);
        Ok(true)
    }

    /// Open tasks across every board, oldest first.
    pub fn pending_tasks(&self) -> Vec<&Task> {
        let mut pending: Vec<&Task> = self
            .board_order
            .iter()
            .filter_map(|id| self.boards.get(id))
            .flat_map(|board| board.task_ids())
            .filter_map(|id| self.tasks.get(id))
            .filter(|task| !task.is_closed())
            .collect();
        pending.sort_by_key(|task| task.created_on);
        pending
    }

    /// Tasks `person_id` has ever been assigned to.
    pub fn tasks_for(&self, person_id: &PersonId) -> Result<Vec<&Task>> {
        self.person(person_id)?;
        Ok(self
            .board_order
            .iter()
            .filter_map(|id| self.boards.get(id))
            .flat_map(|board| board.task_ids())
            .filter_map(|id| self.tasks.get(id))
            .filter(|task| task.assignments.iter().any(|a| a.developer == *person_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[test]
    fn test_sprint_scores() {
        let mut kanban = Kanban::new(KanbanConfig::default()).unwrap();
        let lead = kanban.register_person("Sergio", "sergio@example.com");
        let alex = kanban.register_person("Alex", "alex@example.com");
        let carlos = kanban.register_person("Carlos", "carlos@example.com");
        let board = kanban.create_board("Alpha", &lead).unwrap();
        let today = march(5);

        let login = kanban
            .create_task(&board, "Login", "-", 3, march(15), "Programacion", today)
            .unwrap();
        let mockup = kanban
            .create_task(&board, "Mockup", "-", 2, march(10), "DIU", today)
            .unwrap();
        kanban.assign_task(&login, &alex, today).unwrap();
        kanban.assign_task(&mockup, &carlos, today).unwrap();
        kanban.close_task(&login, today).unwrap();
        kanban.close_task(&mockup, today).unwrap();

        assert!(kanban.close_sprint(&board, today).unwrap());
        assert_eq!(kanban.person(&lead).unwrap().score, 2);
        assert_eq!(kanban.person(&alex).unwrap().score, 9);
        assert_eq!(kanban.person(&carlos).unwrap().score, 4);

        // A second close changes nothing.
        assert!(!kanban.close_sprint(&board, today).unwrap());
        assert_eq!(kanban.person(&alex).unwrap().score, 9);

        assert!(kanban.pending_tasks().is_empty());
        assert_eq!(kanban.tasks_for(&alex).unwrap().len(), 1);
    }

    #[test]
    fn test_sprint_window_near_calendar_start() {
        let config = KanbanConfig {
            sprint_window_days: 36_500,
        };
        let mut kanban = Kanban::new(config).unwrap();
        let lead = kanban.register_person("Lead", "-");
        let board = kanban.create_board("Genesis", &lead).unwrap();
        let first_day = NaiveDate::MIN;
        let task = kanban
            .create_task(&board, "Boot", "-", 1, first_day, "design", first_day)
            .unwrap();
        kanban.close_task(&task, first_day).unwrap();

        assert!(kanban.close_sprint(&board, first_day).unwrap());
        assert_eq!(kanban.person(&lead).unwrap().score, 1);

        let too_long = KanbanConfig {
            sprint_window_days: 36_501,
        };
        assert!(Kanban::new(too_long).is_err());
    }

    #[test]
    fn test_late_tasks_and_window() {
        let mut kanban = Kanban::new(KanbanConfig::default()).unwrap();
        let lead = kanban.register_person("Lead", "-");
        let dev = kanban.register_person("Dev", "-");
        let board = kanban.create_board("Beta", &lead).unwrap();

        let late_design = kanban
            .create_task(&board, "Icons", "-", 4, march(1), "design", march(1))
            .unwrap();
        let late_code = kanban
            .create_task(&board, "API", "-", 4, march(1), "programming", march(1))
            .unwrap();
        let ancient = kanban
            .create_task(&board, "Old", "-", 5, march(1), "programming", march(1))
            .unwrap();
        for task in [&late_design, &late_code, &ancient] {
            kanban.assign_task(task, &dev, march(1)).unwrap();
        }
        kanban.close_task(&ancient, march(1)).unwrap();
        kanban.close_task(&late_design, march(20)).unwrap();
        kanban.close_task(&late_code, march(20)).unwrap();

        kanban.close_sprint(&board, march(25)).unwrap();
        // Late design earns 1, late programming 0, the on-time task fell out of the window.
        assert_eq!(kanban.person(&dev).unwrap().score, 1);
        assert_eq!(kanban.person(&lead).unwrap().score, 0);
    }

    #[test]
    fn test_unknown_kind_and_clamping() {
        let mut kanban = Kanban::new(KanbanConfig::default()).unwrap();
        let lead = kanban.register_person("Lead", "-");
        let board = kanban.create_board("Gamma", &lead).unwrap();

        let err = kanban
            .create_task(&board, "QA", "-", 3, march(9), "testing", march(1))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IllegalArgument);
        assert!(kanban.board(&board).unwrap().task_ids().next().is_none());

        let huge = kanban
            .create_task(&board, "Huge", "-", 42, march(9), "DESIGN", march(1))
            .unwrap();
        let tiny = kanban
            .create_task(&board, "Tiny", "-", -3, march(9), "design", march(1))
            .unwrap();
        assert_eq!(kanban.task(&huge).unwrap().complexity, 5);
        assert_eq!(kanban.task(&tiny).unwrap().complexity, 1);
    }

    #[test]
    fn test_reassignment_and_moves() {
        let mut kanban = Kanban::new(KanbanConfig::default()).unwrap();
        let lead = kanban.register_person("Lead", "-");
        let a = kanban.register_person("A", "-");
        let b = kanban.register_person("B", "-");
        let board = kanban.create_board("Delta", &lead).unwrap();
        let other = kanban.create_board("Epsilon", &lead).unwrap();
        let task = kanban
            .create_task(&board, "Task", "-", 2, march(9), "design", march(1))
            .unwrap();

        kanban.assign_task(&task, &a, march(2)).unwrap();
        kanban.assign_task(&task, &b, march(3)).unwrap();
        let assignments = &kanban.task(&task).unwrap().assignments;
        assert_eq!(assignments[0].ended_on, Some(march(3)));
        assert_eq!(kanban.task(&task).unwrap().current_developer(), Some(b));
        assert_eq!(kanban.tasks_for(&a).unwrap().len(), 1);

        kanban.move_task(&board, &task, "Doing").unwrap();
        assert_eq!(kanban.board(&board).unwrap().list_of(&task), Some("Doing"));
        assert!(matches!(
            kanban.move_task(&other, &task, "Doing"),
            Err(LedgerError::TaskNotOnBoard { .. })
        ));

        kanban.close_task(&task, march(4)).unwrap();
        assert!(matches!(
            kanban.close_task(&task, march(5)),
            Err(LedgerError::TaskAlreadyClosed { .. })
        ));
        assert_eq!(kanban.task(&task).unwrap().closed_on, Some(march(4)));
    }

    #[test]
    fn test_pending_tasks_oldest_first() {
        let mut kanban = Kanban::new(KanbanConfig::default()).unwrap();
        let lead = kanban.register_person("Lead", "-");
        let board = kanban.create_board("Zeta", &lead).unwrap();
        let newer = kanban
            .create_task(&board, "Newer", "-", 1, march(20), "design", march(6))
            .unwrap();
        let older = kanban
            .create_task(&board, "Older", "-", 1, march(20), "design", march(2))
            .unwrap();
        let pending: Vec<TaskId> = kanban.pending_tasks().iter().map(|t| t.id).collect();
        assert_eq!(pending, vec![older, newer]);
    }
}
