//! Online course catalog: recorded and in-person courses, enrollment
//! discounts paid with student bonus, and bonus payouts when an in-person
//! course starts with enough students.

use crate::aggregator::ranking::{average, top_n_by};
use crate::config::CoursesConfig;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rateplan_common::{Amount, Percentage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

crate::uuid_id!(CourseId);
crate::uuid_id!(StudentId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum CourseFormat {
    /// Always has free seats and pays no bonus.
    Recorded,
    /// Limited seats, closed for enrollment from `starts_on`. When more than
    /// `bonus_threshold` students are enrolled at start, each of them earns
    /// `bonus_percentage` of the price as bonus.
    InPerson {
        capacity: usize,
        starts_on: NaiveDate,
        bonus_threshold: usize,
        bonus_percentage: Percentage,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub score: u8,
    pub on: NaiveDate,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub description: String,
    pub price: Amount,
    pub format: CourseFormat,
    pub ratings: Vec<Rating>,
    pub started: bool,
}

impl Course {
    pub fn is_recorded(&self) -> bool {
        matches!(self.format, CourseFormat::Recorded)
    }

    pub fn average_rating(&self) -> Option<Decimal> {
        if self.ratings.is_empty() {
            return None;
        }
        let total: Decimal = self.ratings.iter().map(|r| Decimal::from(r.score)).sum();
        Some(average(total, self.ratings.len()))
    }

    fn has_free_seats(&self, enrolled: usize, today: NaiveDate) -> bool {
        match &self.format {
            CourseFormat::Recorded => true,
            CourseFormat::InPerson {
                capacity,
                starts_on,
                ..
            } => enrolled < *capacity && today < *starts_on,
        }
    }

    /// Bonus owed to each enrolled student when the course starts.
    fn bonus_per_student(&self, enrolled: usize) -> Amount {
        match &self.format {
            CourseFormat::InPerson {
                bonus_threshold,
                bonus_percentage,
                ..
            } if enrolled > *bonus_threshold => bonus_percentage.of(self.price),
            _ => Amount::zero(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub bonus: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub amount: Amount,
    pub discount: Amount,
    pub on: NaiveDate,
}

#[derive(Debug, Default)]
pub struct CourseCatalog {
    config: CoursesConfig,
    courses: HashMap<CourseId, Course>,
    course_order: Vec<CourseId>,
    students: HashMap<StudentId, Student>,
    student_order: Vec<StudentId>,
    enrollments: Vec<Enrollment>,
}

impl CourseCatalog {
    /// Fails with a config error when `config` does not validate.
    pub fn new(config: CoursesConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    pub fn register_student(
        &mut self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> StudentId {
        let student = Student {
            id: StudentId::new(),
            name: name.into(),
            email: email.into(),
            bonus: Amount::zero(),
        };
        let id = student.id;
        self.students.insert(id, student);
        self.student_order.push(id);
        id
    }

    pub fn register_course(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Amount,
        format: CourseFormat,
    ) -> CourseId {
        let course = Course {
            id: CourseId::new(),
            name: name.into(),
            description: description.into(),
            price,
            format,
            ratings: Vec::new(),
            started: false,
        };
        let id = course.id;
        debug!("Registered course {} at {}", course.name, price);
        self.courses.insert(id, course);
        self.course_order.push(id);
        id
    }

    pub fn course(&self, course_id: &CourseId) -> Result<&Course> {
        self.courses
            .get(course_id)
            .ok_or_else(|| LedgerError::CourseNotFound {
                id: course_id.to_string(),
            })
    }

    fn course_mut(&mut self, course_id: &CourseId) -> Result<&mut Course> {
        self.courses
            .get_mut(course_id)
            .ok_or_else(|| LedgerError::CourseNotFound {
                id: course_id.to_string(),
            })
    }

    pub fn student(&self, student_id: &StudentId) -> Result<&Student> {
        self.students
            .get(student_id)
            .ok_or_else(|| LedgerError::StudentNotFound {
                id: student_id.to_string(),
            })
    }

    fn student_mut(&mut self, student_id: &StudentId) -> Result<&mut Student> {
        self.students
            .get_mut(student_id)
            .ok_or_else(|| LedgerError::StudentNotFound {
                id: student_id.to_string(),
            })
    }

    fn enrolled_in(&self, course_id: &CourseId) -> usize {
        self.enrollments
            .iter()
            .filter(|e| e.course_id == *course_id)
            .count()
    }

    /// Enroll a student. Part of the price is paid from the student's bonus,
    /// capped at `max_bonus_share` of the price.
    pub fn enroll(
        &mut self,
        student_id: &StudentId,
        course_id: &CourseId,
        today: NaiveDate,
    ) -> Result<&Enrollment> {
        let course = self.course(course_id)?;
        let student = self.student(student_id)?;
        if !course.has_free_seats(self.enrolled_in(course_id), today) {
            return Err(LedgerError::NoSeatsAvailable {
                course: course.name.clone(),
            });
        }

        let price = course.price;
        let discount = student.bonus.min(price.multiply(self.config.max_bonus_share));
        let amount = price.saturating_sub(discount);
        info!(
            "Enrolled {} in {} for {} (bonus used: {})",
            student.name, course.name, amount, discount
        );

        let student = self.student_mut(student_id)?;
        student.bonus = student.bonus.saturating_sub(discount);
        self.enrollments.push(Enrollment {
            student_id: *student_id,
            course_id: *course_id,
            amount,
            discount,
            on: today,
        });
        Ok(&self.enrollments[self.enrollments.len() - 1])
    }

    pub fn rate(
        &mut self,
        course_id: &CourseId,
        score: u8,
        on: NaiveDate,
        comment: impl Into<String>,
    ) -> Result<()> {
        let (min, max) = (self.config.min_rating, self.config.max_rating);
        if !(min..=max).contains(&score) {
            return Err(LedgerError::RatingOutOfRange { score, min, max });
        }

        self.course_mut(course_id)?.ratings.push(Rating {
            score,
            on,
            comment: comment.into(),
        });
        Ok(())
    }

    pub fn change_price(&mut self, course_id: &CourseId, price: Amount) -> Result<()> {
        self.course_mut(course_id)?.price = price;
        Ok(())
    }

    /// Start a course and pay out the in-person bonus. Returns the bonus each
    /// enrolled student received.
    pub fn start_course(&mut self, course_id: &CourseId) -> Result<Amount> {
        let enrolled = self.enrolled_in(course_id);
        let course = self.course_mut(course_id)?;
        if course.started {
            return Err(LedgerError::CourseAlreadyStarted {
                course: course.name.clone(),
            });
        }
        course.started = true;
        let bonus = course.bonus_per_student(enrolled);
        let course_name = course.name.clone();

        if !bonus.is_zero() {
            let payees: Vec<StudentId> = self
                .enrollments
                .iter()
                .filter(|e| e.course_id == *course_id)
                .map(|e| e.student_id)
                .collect();
            for student_id in &payees {
                let student = self.student_mut(student_id)?;
                student.bonus = student.bonus.add(bonus);
            }
            info!(
                "Started {} with {} students, paid {} bonus each",
                course_name, enrolled, bonus
            );
        }

        Ok(bonus)
    }

    pub fn enrollments_of(&self, student_id: &StudentId) -> Result<Vec<&Enrollment>> {
        self.student(student_id)?;
        Ok(self
            .enrollments
            .iter()
            .filter(|e| e.student_id == *student_id)
            .collect())
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> + '_ {
        self.course_order
            .iter()
            .filter_map(move |id| self.courses.get(id))
    }

    /// Mean enrollments per course as `(recorded, in_person)`.
    pub fn average_enrollments(&self) -> (Decimal, Decimal) {
        let (mut recorded, mut in_person) = ((0usize, 0usize), (0usize, 0usize));
        for course in self.courses() {
            let enrolled = self.enrolled_in(&course.id);
            let bucket = if course.is_recorded() {
                &mut recorded
            } else {
                &mut in_person
            };
            bucket.0 += enrolled;
            bucket.1 += 1;
        }
        (
            average(Decimal::from(recorded.0), recorded.1),
            average(Decimal::from(in_person.0), in_person.1),
        )
    }

    /// Best average rating first. Unrated courses are left out.
    pub fn top_rated(&self, n: usize) -> Vec<(&Course, Decimal)> {
        let rated = self
            .courses()
            .filter_map(|course| course.average_rating().map(|avg| (course, avg)));
        top_n_by(rated, n, |(_, avg)| *avg)
    }

    /// [`top_rated`](Self::top_rated) with the configured listing length.
    pub fn top_rated_default(&self) -> Vec<(&Course, Decimal)> {
        self.top_rated(self.config.top_rated)
    }
}
