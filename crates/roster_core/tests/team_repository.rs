use roster_core::db::open_db_in_memory;
use roster_core::{
    Member, MemberRepository, RepoError, Session, StoreConfig, Team, TeamDeletePolicy,
    TeamRepository,
};

fn seed(session: &Session) -> Team {
    let teams = TeamRepository::new(session);
    let members = MemberRepository::try_new(session).unwrap();
    let team = teams.save(&Team::new("teamA")).unwrap();
    members
        .save(&Member::with_team("member1", 10, &team).unwrap())
        .unwrap();
    members
        .save(&Member::with_team("member2", 20, &team).unwrap())
        .unwrap();
    members.save(&Member::with_age("loner", 30)).unwrap();
    team
}

#[test]
fn find_with_members_loads_back_reference() {
    let session = Session::new(open_db_in_memory().unwrap());
    let team = seed(&session);
    let teams = TeamRepository::new(&session);

    let loaded = teams.find_with_members(team.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.team, team);
    let names: Vec<&str> = loaded.members.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["member1", "member2"]);

    assert_eq!(teams.find_with_members(404).unwrap(), None);
}

#[test]
fn reject_policy_keeps_team_with_members() {
    let session = Session::new(open_db_in_memory().unwrap());
    let team = seed(&session);
    let teams = TeamRepository::new(&session);
    assert_eq!(teams.delete_policy(), TeamDeletePolicy::Reject);

    let err = teams.delete(&team).unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)), "{err}");
    assert_eq!(teams.count().unwrap(), 1);
    assert_eq!(MemberRepository::try_new(&session).unwrap().count().unwrap(), 3);
}

#[test]
fn reject_policy_allows_empty_team_delete() {
    let session = Session::new(open_db_in_memory().unwrap());
    let teams = TeamRepository::new(&session);
    let team = teams.save(&Team::new("empty")).unwrap();

    teams.delete(&team).unwrap();
    teams.delete(&team).unwrap();
    assert_eq!(teams.find_by_id(team.id.unwrap()).unwrap(), None);
}

#[test]
fn cascade_policy_removes_owned_members() {
    let config = StoreConfig::default().with_team_delete_policy(TeamDeletePolicy::Cascade);
    let session = Session::open_in_memory(config).unwrap();
    let team = seed(&session);
    let teams = TeamRepository::new(&session);
    let members = MemberRepository::try_new(&session).unwrap();

    teams.delete_by_id(team.id.unwrap()).unwrap();

    assert_eq!(teams.count().unwrap(), 0);
    let remaining: Vec<String> = members
        .find_all()
        .unwrap()
        .into_iter()
        .map(|m| m.username)
        .collect();
    assert_eq!(remaining, vec!["loner"]);
}

#[test]
fn explicit_policy_overrides_session_config() {
    let session = Session::new(open_db_in_memory().unwrap());
    let team = seed(&session);
    let teams = TeamRepository::with_policy(&session, TeamDeletePolicy::Cascade);

    teams.delete(&team).unwrap();
    assert_eq!(teams.find_all().unwrap(), Vec::<Team>::new());
}

#[test]
fn blank_team_name_is_rejected() {
    let session = Session::new(open_db_in_memory().unwrap());
    let teams = TeamRepository::new(&session);

    let err = teams.save(&Team::new(" ")).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}
