//! # Query Module
//!
//! Listing primitives: composable filters, sort order and pagination.
//!
//! - Filters are plain predicate closures, combined explicitly at the call site
//! - Ordering is by primary key (creation order), oldest or newest first
//! - Pages are 1-based; sizes are clamped to `MAX_PAGE_SIZE`
//!
//! The predicate builders in [`program`], [`batch`], [`registration`] and
//! [`assessment`] are the named filters used across the API and CLI.

use crate::primitives::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::storage::Record;
use crate::CertisError;
use serde::{Deserialize, Serialize};
use std::fmt;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A conjunction of predicates. The empty filter matches everything.
pub struct Filter<T> {
    predicates: Vec<Predicate<T>>,
}

impl<T> Filter<T> {
    /// Match every record.
    #[must_use]
    pub fn all() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Add a predicate that must also hold.
    #[must_use]
    pub fn and(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Add a predicate only when `value` is present.
    #[must_use]
    pub fn and_opt<V, P>(self, value: Option<V>, build: impl FnOnce(V) -> P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        match value {
            Some(v) => self.and(build(v)),
            None => self,
        }
    }

    #[must_use]
    pub fn matches(&self, item: &T) -> bool {
        self.predicates.iter().all(|p| p(item))
    }
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// Listing order by primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Oldest,
    #[default]
    Newest,
}

impl std::str::FromStr for SortOrder {
    type Err = CertisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest" | "asc" => Ok(SortOrder::Oldest),
            "newest" | "latest" | "desc" => Ok(SortOrder::Newest),
            _ => Err(CertisError::validation("sort", format!("unknown order '{s}'"))),
        }
    }
}

/// A page request. Construct through [`PageRequest::new`] to get clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: usize,
    per_page: usize,
}

impl PageRequest {
    /// Page 0 becomes 1; size 0 becomes the default; oversize is capped.
    #[must_use]
    pub fn new(page: usize, per_page: usize) -> Self {
        let per_page = match per_page {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        Self {
            page: page.max(1),
            per_page,
        }
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub fn per_page(&self) -> usize {
        self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub last_page: usize,
}

impl<T> Page<T> {
    /// Slice an already ordered list.
    #[must_use]
    pub fn paginate(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let last_page = total.div_ceil(request.per_page).max(1);
        let skip = (request.page - 1).saturating_mul(request.per_page);
        Self {
            items: items.into_iter().skip(skip).take(request.per_page).collect(),
            total,
            page: request.page,
            per_page: request.per_page,
            last_page,
        }
    }

    /// Convert the items, keeping the paging numbers.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
        }
    }
}

/// Filter, order and paginate records loaded in id order.
pub fn select<R: Record>(
    records: Vec<R>,
    filter: &Filter<R>,
    order: SortOrder,
    request: PageRequest,
) -> Page<R> {
    let mut matched: Vec<R> = records.into_iter().filter(|r| filter.matches(r)).collect();
    match order {
        SortOrder::Oldest => matched.sort_by_key(R::key),
        SortOrder::Newest => matched.sort_by_key(|r| std::cmp::Reverse(r.key())),
    }
    Page::paginate(matched, request)
}

// =============================================================================
// PREDICATE BUILDERS
// =============================================================================

pub mod program {
    use crate::{Program, ProgramKind, ProgramStatus};

    pub fn active() -> impl Fn(&Program) -> bool + Send + Sync + 'static {
        |p| p.status == ProgramStatus::Active
    }

    pub fn of_kind(kind: ProgramKind) -> impl Fn(&Program) -> bool + Send + Sync + 'static {
        move |p| p.kind == kind
    }

    /// Case-insensitive substring match on the name.
    pub fn name_contains(needle: &str) -> impl Fn(&Program) -> bool + Send + Sync + use<> {
        let needle = needle.to_lowercase();
        move |p| p.name.to_lowercase().contains(&needle)
    }
}

pub mod batch {
    use crate::{Batch, ProgramId, ProgramStatus};

    pub fn of_program(program: ProgramId) -> impl Fn(&Batch) -> bool + Send + Sync + 'static {
        move |b| b.program_id == program
    }

    pub fn active() -> impl Fn(&Batch) -> bool + Send + Sync + 'static {
        |b| b.status == ProgramStatus::Active
    }
}

pub mod registration {
    use crate::{Registration, RegistrationStatus, SubjectId, Target};

    pub fn with_status(
        status: RegistrationStatus,
    ) -> impl Fn(&Registration) -> bool + Send + Sync + 'static {
        move |r| r.status == status
    }

    pub fn pending() -> impl Fn(&Registration) -> bool + Send + Sync + 'static {
        with_status(RegistrationStatus::Pending)
    }

    pub fn approved() -> impl Fn(&Registration) -> bool + Send + Sync + 'static {
        with_status(RegistrationStatus::Approved)
    }

    pub fn for_target(target: Target) -> impl Fn(&Registration) -> bool + Send + Sync + 'static {
        move |r| r.target == target
    }

    pub fn for_subject(
        subject: SubjectId,
    ) -> impl Fn(&Registration) -> bool + Send + Sync + 'static {
        move |r| r.subject == subject
    }
}

pub mod assessment {
    use crate::Assessment;

    pub fn passed(passed: bool) -> impl Fn(&Assessment) -> bool + Send + Sync + 'static {
        move |a| a.passed == passed
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        BatchId, Program, ProgramId, ProgramKind, ProgramStatus, Registration,
        RegistrationDetails, RegistrationId, RegistrationStatus, SubjectId, Target,
    };
    use chrono::Utc;

    fn programs() -> Vec<Program> {
        (1..=5)
            .map(|i| Program {
                id: ProgramId(i),
                kind: if i % 2 == 0 {
                    ProgramKind::Internship
                } else {
                    ProgramKind::Certification
                },
                name: format!("Program {i}"),
                description: String::new(),
                quota: 10,
                registered: 0,
                status: if i <= 3 {
                    ProgramStatus::Active
                } else {
                    ProgramStatus::Draft
                },
                thumbnail_url: None,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(0, 0), PageRequest::new(1, DEFAULT_PAGE_SIZE));
        assert_eq!(PageRequest::new(2, 1_000).per_page(), MAX_PAGE_SIZE);
    }

    #[test]
    fn paginate_reports_last_page() {
        let page = Page::paginate((1..=31).collect::<Vec<_>>(), PageRequest::new(3, 15));
        assert_eq!(page.items, vec![31]);
        assert_eq!(page.total, 31);
        assert_eq!(page.last_page, 3);

        let empty = Page::paginate(Vec::<u8>::new(), PageRequest::default());
        assert_eq!(empty.last_page, 1);
        assert!(empty.items.is_empty());

        let beyond = Page::paginate(vec![1, 2], PageRequest::new(9, 15));
        assert!(beyond.items.is_empty());
    }

    #[test]
    fn composed_filters() {
        let filter = Filter::all()
            .and(program::active())
            .and(program::of_kind(ProgramKind::Certification));
        let page = select(programs(), &filter, SortOrder::Oldest, PageRequest::default());
        let ids: Vec<_> = page.items.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn newest_first_by_default() {
        let page = select(
            programs(),
            &Filter::default(),
            SortOrder::default(),
            PageRequest::new(1, 2),
        );
        let ids: Vec<_> = page.items.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![5, 4]);
        assert_eq!(page.last_page, 3);
    }

    #[test]
    fn name_search_ignores_case() {
        let filter = Filter::all().and(program::name_contains("PROGRAM 4"));
        assert_eq!(programs().iter().filter(|p| filter.matches(p)).count(), 1);
    }

    #[test]
    fn optional_predicates() {
        let reg = Registration {
            id: RegistrationId(1),
            subject: SubjectId(9),
            target: Target::Batch(BatchId(2)),
            status: RegistrationStatus::Pending,
            details: RegistrationDetails::default(),
            submitted_at: Utc::now(),
            admin_note: None,
            processed_at: None,
            cancelled_at: None,
        };
        let none: Option<SubjectId> = None;
        let filter = Filter::all()
            .and(registration::pending())
            .and_opt(none, registration::for_subject)
            .and_opt(Some(Target::Batch(BatchId(2))), registration::for_target);
        assert!(filter.matches(&reg));

        let other = Filter::all().and(registration::approved());
        assert!(!other.matches(&reg));
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Oldest);
        assert_eq!("latest".parse::<SortOrder>().unwrap(), SortOrder::Newest);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
