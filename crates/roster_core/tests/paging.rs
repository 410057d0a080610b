use roster_core::db::open_db_in_memory;
use roster_core::{
    Filter, Member, MemberRepository, PageRequest, RepoError, Repository, Session, Sort, Team,
};

fn session() -> Session {
    Session::new(open_db_in_memory().unwrap())
}

fn seed_same_age(session: &Session, count: usize, age: i32) {
    let repo = Repository::<Member>::new(session);
    for index in 1..=count {
        repo.save(&Member::with_age(format!("member{index}"), age))
            .unwrap();
    }
}

#[test]
fn first_page_of_five_members_by_username() {
    let session = session();
    seed_same_age(&session, 5, 10);
    let repo = Repository::<Member>::new(&session);

    let request = PageRequest::of_sorted(0, 3, Sort::asc("username")).unwrap();
    let page = repo
        .find_page(&Filter::new().eq("age", 10), &request)
        .unwrap();

    let names: Vec<&str> = page.content().iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["member1", "member2", "member3"]);
    assert_eq!(page.number_of_elements(), 3);
    assert_eq!(page.total_elements(), 5);
    assert_eq!(page.total_pages(), 2);
    assert!(page.is_first());
    assert!(page.has_next());
}

#[test]
fn pages_cover_every_match_exactly_once() {
    let session = session();
    seed_same_age(&session, 7, 10);
    let repo = MemberRepository::try_new(&session).unwrap();

    let mut request = PageRequest::of_sorted(0, 3, Sort::desc("username")).unwrap();
    let first = repo.find_by_age(10, &request).unwrap();
    let mut seen = Vec::new();
    for _ in 0..first.total_pages() {
        let page = repo.find_by_age(10, &request).unwrap();
        assert_eq!(page.total_elements(), 7);
        seen.extend(page.into_content().into_iter().map(|m| m.username));
        request = request.next().unwrap();
    }

    assert_eq!(seen.len() as i64, first.total_elements());
    assert_eq!(seen.first().map(String::as_str), Some("member7"));
    let mut deduped = seen.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), seen.len());
}

#[test]
fn equal_sort_keys_break_ties_by_id() {
    let session = session();
    seed_same_age(&session, 4, 10);
    let repo = Repository::<Member>::new(&session);

    let request = PageRequest::of_sorted(0, 2, Sort::asc("age")).unwrap();
    let first = repo.find_page(&Filter::new(), &request).unwrap();
    let second = repo.find_page(&Filter::new(), &request.next().unwrap()).unwrap();

    let ids: Vec<i64> = first
        .content()
        .iter()
        .chain(second.content())
        .filter_map(|m| m.id)
        .collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[test]
fn page_past_the_end_is_empty_with_totals() {
    let session = session();
    seed_same_age(&session, 5, 10);
    let repo = MemberRepository::try_new(&session).unwrap();

    let page = repo
        .find_by_age(10, &PageRequest::of(4, 3).unwrap())
        .unwrap();
    assert!(page.content().is_empty());
    assert_eq!(page.total_elements(), 5);
    assert_eq!(page.total_pages(), 2);
    assert!(!page.has_next());
    assert!(page.is_last());
}

#[test]
fn empty_match_yields_zero_pages() {
    let session = session();
    let repo = MemberRepository::try_new(&session).unwrap();

    let page = repo
        .find_by_age(99, &PageRequest::of(0, 10).unwrap())
        .unwrap();
    assert_eq!(page.total_elements(), 0);
    assert_eq!(page.total_pages(), 0);
    assert!(page.is_first());
    assert!(page.is_last());
}

#[test]
fn maximal_page_size_returns_everything_on_one_page() {
    let session = session();
    seed_same_age(&session, 3, 10);
    let repo = Repository::<Member>::new(&session);

    let request = PageRequest::of(0, i64::MAX).unwrap();
    let page = repo.find_page(&Filter::new(), &request).unwrap();
    assert_eq!(page.number_of_elements(), 3);
    assert_eq!(page.total_pages(), 1);
    assert!(page.is_last());
    assert_eq!(request.next().unwrap().offset(), i64::MAX);
}

#[test]
fn invalid_page_size_is_rejected_before_querying() {
    let err = PageRequest::of(0, 0).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
    let err = PageRequest::of(-1, 10).unwrap_err();
    assert!(matches!(err, RepoError::InvalidArgument(_)));
}

#[test]
fn page_map_converts_records_to_dtos() {
    let session = session();
    let team = Repository::<Team>::new(&session)
        .save(&Team::new("teamA"))
        .unwrap();
    let repo = Repository::<Member>::new(&session);
    for index in 1..=3 {
        repo.save(&Member::with_team(format!("member{index}"), 10, &team).unwrap())
            .unwrap();
    }

    let page = repo
        .find_page(&Filter::new(), &PageRequest::of(0, 2).unwrap())
        .unwrap()
        .map(|member| (member.username, member.team_id));

    assert_eq!(
        page.content(),
        &[
            ("member1".to_string(), team.id),
            ("member2".to_string(), team.id)
        ]
    );
    assert_eq!(page.total_elements(), 3);
}

#[test]
fn page_reads_inside_an_open_transaction() {
    let session = session();
    seed_same_age(&session, 3, 10);
    let repo = Repository::<Member>::new(&session);

    let total = session
        .transaction(roster_core::TransactionBehavior::Deferred, || {
            repo.save(&Member::with_age("member4", 10))?;
            let page = repo.find_page(
                &Filter::new().eq("age", 10),
                &PageRequest::of(0, 10)?,
            )?;
            Ok(page.total_elements())
        })
        .unwrap();
    assert_eq!(total, 4);
}

#[test]
fn unknown_sort_field_is_rejected() {
    let session = session();
    let repo = Repository::<Member>::new(&session);

    let request = PageRequest::of_sorted(0, 3, Sort::asc("nickname")).unwrap();
    let err = repo.find_page(&Filter::new(), &request).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}
