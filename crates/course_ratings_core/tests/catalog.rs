mod support;

use course_ratings_core::{SearchHit, ServiceError};
use support::{user_id, Fixture};

#[tokio::test]
async fn course_lookup_ignores_case() {
    let fx = Fixture::new();
    let course = fx.service.get_course_by_code("cc").await.unwrap();
    assert_eq!(course, Some(fx.course.clone()));
    assert_eq!(fx.service.get_course_by_code("XX").await.unwrap(), None);

    let err = fx.service.get_course_by_code("  ").await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn emphases_are_listed_by_course() {
    let fx = Fixture::new();
    let emphases = fx
        .service
        .list_emphases(&fx.course.id.to_string())
        .await
        .unwrap();
    assert_eq!(emphases, vec![fx.emphasis.clone()]);

    let emphasis = fx.service.get_emphasis_by_code("cc", "red").await.unwrap();
    assert_eq!(emphasis.map(|e| e.id), Some(fx.emphasis.id));
}

#[tokio::test]
async fn basic_disciplines_carry_counts_and_tier() {
    let fx = Fixture::new();
    fx.db.add_rating(fx.ana.id, fx.calculus.id, uuid::Uuid::new_v4(), 4);

    let listed = fx.service.list_basic_disciplines("CC").await.unwrap();
    assert_eq!(listed.len(), 1);
    let calculus = &listed[0];
    assert_eq!(calculus.code, "MAT01");
    assert_eq!(calculus.kind.as_deref(), Some("básica"));
    assert_eq!(calculus.suggested_period.as_deref(), Some("1"));
    assert!(calculus.mandatory);
    assert_eq!(calculus.total_professors, 1);
    assert_eq!(calculus.total_ratings, 1);

    let specific = fx
        .service
        .list_emphasis_disciplines("CC", "RED")
        .await
        .unwrap();
    assert_eq!(specific.len(), 1);
    assert_eq!(specific[0].kind.as_deref(), Some("específica"));
    assert_eq!(specific[0].total_professors, 0);
}

#[tokio::test]
async fn discipline_found_by_code_or_id() {
    let fx = Fixture::new();
    let by_code = fx.service.get_discipline("mat01").await.unwrap();
    assert_eq!(by_code.map(|d| d.id), Some(fx.calculus.id));

    let by_id = fx
        .service
        .get_discipline(&fx.networks.id.to_string())
        .await
        .unwrap();
    assert_eq!(by_id.map(|d| d.code), Some("CC42".to_string()));

    assert_eq!(fx.service.get_discipline("NOPE").await.unwrap(), None);
}

#[tokio::test]
async fn discipline_details_include_first_association() {
    let fx = Fixture::new();
    let details = fx
        .service
        .get_discipline_details(&fx.calculus.id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(details.course_code.as_deref(), Some("CC"));
    assert_eq!(details.total_professors, 1);
    assert_eq!(details.total_ratings, 0);

    let missing = fx
        .service
        .get_discipline_details(&uuid::Uuid::new_v4().to_string())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn professors_of_discipline_have_statistics_sorted_by_name() {
    let fx = Fixture::new();
    let bruno = fx.db.add_professor("bruno Costa");
    fx.db.link(bruno.id, fx.calculus.id);
    fx.db.add_rating(fx.ana.id, fx.calculus.id, uuid::Uuid::new_v4(), 5);
    fx.db.add_rating(fx.ana.id, fx.calculus.id, uuid::Uuid::new_v4(), 4);

    let stats = fx
        .service
        .list_professors_for_discipline(&fx.calculus.id.to_string())
        .await
        .unwrap();
    let names: Vec<&str> = stats.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Ana Souza", "bruno Costa"]);
    assert_eq!(stats[0].total_ratings, 2);
    assert_eq!(stats[0].average_stars, 4.5);
    assert_eq!(stats[0].total_disciplines, 1);
    assert_eq!(stats[1].average_stars, 0.0);
}

#[tokio::test]
async fn professor_profile_groups_ratings_by_discipline() {
    let fx = Fixture::new();
    fx.db.link(fx.ana.id, fx.networks.id);
    fx.service
        .create_rating(
            &fx.ana.id.to_string(),
            &fx.calculus.id.to_string(),
            &user_id(),
            3,
            Some("Boa"),
        )
        .await
        .unwrap();

    let profile = fx
        .service
        .get_professor_profile(&fx.ana.id.to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.professor.id, fx.ana.id);
    assert_eq!(profile.ratings.len(), 1);
    assert_eq!(profile.ratings[0].discipline_code, "MAT01");
    assert_eq!(profile.disciplines.len(), 2);
    let calculus = profile
        .disciplines
        .iter()
        .find(|d| d.discipline.id == fx.calculus.id)
        .unwrap();
    assert_eq!(calculus.total_ratings, 1);
    assert_eq!(calculus.average_stars, 3.0);
}

#[tokio::test]
async fn short_search_terms_return_nothing() {
    let fx = Fixture::new();
    assert!(fx.service.search("an").await.unwrap().is_empty());
}

#[tokio::test]
async fn search_covers_disciplines_and_professors() {
    let fx = Fixture::new();
    let hits = fx.service.search("cálculo").await.unwrap();
    assert_eq!(hits.len(), 1);
    match &hits[0] {
        SearchHit::Discipline { code, professors, .. } => {
            assert_eq!(code, "MAT01");
            assert_eq!(professors, "Ana Souza");
        }
        other => panic!("unexpected hit {other:?}"),
    }

    let hits = fx.service.search("redes").await.unwrap();
    assert!(matches!(
        &hits[0],
        SearchHit::Discipline { professors, .. } if professors == "Não informado"
    ));

    let hits = fx.service.search("souza").await.unwrap();
    assert!(matches!(
        &hits[0],
        SearchHit::Professor { disciplines, .. } if disciplines == &["Cálculo I".to_string()]
    ));
}

#[tokio::test]
async fn failing_search_section_is_skipped() {
    let fx = Fixture::new();
    fx.db.fail_on("search_disciplines");
    let hits = fx.service.search("Ana").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(matches!(hits[0], SearchHit::Professor { .. }));
}

#[tokio::test]
async fn general_stats_count_tables() {
    let fx = Fixture::new();
    let stats = fx.service.general_stats().await.unwrap();
    assert_eq!(stats.total_courses, 1);
    assert_eq!(stats.total_disciplines, 2);
    assert_eq!(stats.total_professors, 1);
    assert_eq!(stats.total_ratings, 0);

    fx.db.fail_on("count_rows");
    assert!(matches!(
        fx.service.general_stats().await,
        Err(ServiceError::Backend(_))
    ));
}

#[tokio::test]
async fn associations_are_upserted_and_removed() {
    let fx = Fixture::new();
    fx.service
        .associate_discipline_course("cc42", "cc", Some("6"), false)
        .await
        .unwrap();
    fx.service
        .associate_discipline_course("CC42", "CC", Some("7"), true)
        .await
        .unwrap();

    let courses = fx.service.list_courses_of_discipline("CC42").await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].suggested_period.as_deref(), Some("7"));
    assert!(courses[0].mandatory);

    let offered = fx.service.list_disciplines_of_course("CC").await.unwrap();
    assert_eq!(offered.len(), 2);

    fx.service
        .remove_discipline_course("CC42", "CC")
        .await
        .unwrap();
    assert!(fx
        .service
        .list_courses_of_discipline("CC42")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn association_with_unknown_codes_names_them() {
    let fx = Fixture::new();
    let err = fx
        .service
        .associate_discipline_course("ZZ99", "CC", None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(m) if m == "Disciplina ZZ99 não encontrada"));

    let err = fx
        .service
        .associate_discipline_courses("MAT01", &["CC".into(), "EQ".into()], None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(m) if m == "Curso EQ não encontrado"));
}

#[tokio::test]
async fn basic_disciplines_are_tagged_in_bulk() {
    let fx = Fixture::new();
    let updated = fx
        .service
        .mark_basic_disciplines(&["mat01".into(), "CC42".into(), "XX".into()])
        .await
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(
        fx.db.discipline(fx.networks.id).and_then(|d| d.kind),
        Some("básica".to_string())
    );

    let err = fx.service.mark_basic_disciplines(&[]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}
