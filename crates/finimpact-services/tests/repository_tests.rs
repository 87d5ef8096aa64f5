//! Repository tests against a temporary SQLite database

mod common;

use common::{TestDb, date};
use finimpact_services::{
    AtributoImpacto, EstadoIniciativa, Iniciativa, NuevoUsuario, Riesgo, Rol, TipoImpacto,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_usuario_save_and_find() {
    let db = TestDb::new().await;
    let repo = &db.services.usuarios;

    let id = repo
        .save(&NuevoUsuario {
            nombre_completo: "Ana Torres".into(),
            email: "ana@finimpact.com".into(),
            password: "clave123".into(),
            rol: Rol::Analista,
        })
        .await
        .unwrap();

    let usuario = repo.find_by_email("ana@finimpact.com").await.unwrap().unwrap();
    assert_eq!(usuario.id_usuario, id);
    assert_eq!(usuario.rol, Rol::Analista);
    assert!(usuario.activo);
    assert_ne!(usuario.password_hash, "clave123");

    assert!(repo.find_by_email("nobody@finimpact.com").await.unwrap().is_none());
    assert!(repo.find_by_id(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn test_usuario_authenticate() {
    let db = TestDb::new().await;
    let repo = &db.services.usuarios;
    let session = db.user("Ana", "ana@finimpact.com", Rol::Viewer).await;

    assert!(
        repo.authenticate("ana@finimpact.com", "secret123")
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        repo.authenticate("ana@finimpact.com", "wrong")
            .await
            .unwrap()
            .is_none()
    );

    repo.update_estado(session.id_usuario(), false).await.unwrap();
    assert!(
        repo.authenticate("ana@finimpact.com", "secret123")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_usuario_soft_delete_hides_from_list() {
    let db = TestDb::new().await;
    let repo = &db.services.usuarios;
    let ana = db.user("Ana", "ana@finimpact.com", Rol::Viewer).await;
    db.user("Bruno", "bruno@finimpact.com", Rol::Viewer).await;

    assert!(repo.delete(ana.id_usuario()).await.unwrap());

    let names: Vec<String> = repo
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.nombre_completo)
        .collect();
    assert_eq!(names, vec!["Bruno".to_string()]);

    let inactive = repo
        .find_by_rol_and_estado(Rol::Viewer, false)
        .await
        .unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].email, "ana@finimpact.com");
}

#[tokio::test]
async fn test_usuario_update_keeps_password_when_absent() {
    let db = TestDb::new().await;
    let repo = &db.services.usuarios;
    let session = db.user("Ana", "ana@finimpact.com", Rol::Viewer).await;

    let mut usuario = session.usuario().clone();
    usuario.nombre_completo = "Ana Maria".into();
    usuario.rol = Rol::Analista;
    assert!(repo.update(&usuario, None).await.unwrap());

    let stored = repo.find_by_id(usuario.id_usuario).await.unwrap().unwrap();
    assert_eq!(stored.nombre_completo, "Ana Maria");
    assert_eq!(stored.rol, Rol::Analista);
    assert_eq!(stored.password_hash, session.usuario().password_hash);

    assert!(repo.update(&usuario, Some("nueva123")).await.unwrap());
    assert!(
        repo.authenticate("ana@finimpact.com", "nueva123")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_iniciativa_round_trip() {
    let db = TestDb::new().await;
    let repo = &db.services.iniciativas;
    let owner = db.user("Ana", "ana@finimpact.com", Rol::Analista).await;

    let mut iniciativa = Iniciativa::nueva("Optimización Línea A", "Operativa");
    iniciativa.descripcion = "Reducir tiempos".into();
    iniciativa.fecha_inicio = Some(date("2024-01-01"));
    iniciativa.fecha_fin = Some(date("2024-06-30"));
    iniciativa.estado = EstadoIniciativa::EnCurso;
    iniciativa.riesgo = Riesgo::Alto;
    iniciativa.id_owner = Some(owner.id_usuario());

    let id = repo.save(&iniciativa).await.unwrap();
    let stored = repo.find_by_id(id).await.unwrap().unwrap();

    assert_eq!(stored.nombre, "Optimización Línea A");
    assert_eq!(stored.descripcion, "Reducir tiempos");
    assert_eq!(stored.fecha_inicio, Some(date("2024-01-01")));
    assert_eq!(stored.fecha_fin, Some(date("2024-06-30")));
    assert_eq!(stored.estado, EstadoIniciativa::EnCurso);
    assert_eq!(stored.riesgo, Riesgo::Alto);
    assert_eq!(stored.id_owner, Some(owner.id_usuario()));
    assert!(stored.is_owned_by(owner.id_usuario()));
}

#[tokio::test]
async fn test_iniciativa_queries() {
    let db = TestDb::new().await;
    let repo = &db.services.iniciativas;
    let owner = db.user("Ana", "ana@finimpact.com", Rol::Analista).await;

    let a = db.iniciativa("Alpha", Some(owner.id_usuario())).await;
    let b = db.iniciativa("Beta", None).await;
    db.iniciativa("Alpha", None).await;

    let mut beta = repo.find_by_id(b).await.unwrap().unwrap();
    beta.estado = EstadoIniciativa::EnCurso;
    beta.riesgo = Riesgo::Alto;
    assert!(repo.update(&beta).await.unwrap());

    assert_eq!(repo.find_all().await.unwrap().len(), 3);
    assert_eq!(repo.find_by_name("Alpha").await.unwrap().len(), 2);

    let owned = repo.find_by_owner(owner.id_usuario()).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id_iniciativa, a);

    let owned_alpha = repo
        .find_by_owner_and_name(owner.id_usuario(), "Alpha")
        .await
        .unwrap();
    assert_eq!(owned_alpha.len(), 1);

    let en_curso = repo.find_by_estado(EstadoIniciativa::EnCurso).await.unwrap();
    assert_eq!(en_curso.len(), 1);
    assert_eq!(en_curso[0].id_iniciativa, b);
    assert_eq!(repo.count_activas().await.unwrap(), 1);

    let filtered = repo
        .find_by_filters(None, Some("  "), Some(Riesgo::Alto), None)
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].nombre, "Beta");

    let filtered = repo
        .find_by_filters(
            Some(EstadoIniciativa::Planeado),
            Some("Operativa"),
            None,
            Some(owner.id_usuario()),
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id_iniciativa, a);
}

#[tokio::test]
async fn test_assign_owner_by_name() {
    let db = TestDb::new().await;
    let repo = &db.services.iniciativas;
    let owner = db.user("Ana", "ana@finimpact.com", Rol::Analista).await;
    db.iniciativa("Alpha", None).await;
    db.iniciativa("Alpha", None).await;

    let updated = repo
        .assign_owner_by_name(owner.id_usuario(), "Alpha")
        .await
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(
        repo.assign_owner_by_name(owner.id_usuario(), "Missing")
            .await
            .unwrap(),
        0
    );
    assert_eq!(repo.find_by_owner(owner.id_usuario()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_iniciativa_cascades_to_impactos() {
    let db = TestDb::new().await;
    let id = db.iniciativa("Alpha", None).await;
    db.impacto(id, TipoImpacto::Maquinaria, AtributoImpacto::Real, "2024-01-10", "100")
        .await;

    assert!(db.services.iniciativas.delete(id).await.unwrap());
    assert!(!db.services.iniciativas.delete(id).await.unwrap());
    assert!(db.services.impactos.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_impacto_round_trip_keeps_cents() {
    let db = TestDb::new().await;
    let id_iniciativa = db.iniciativa("Alpha", None).await;
    let id = db
        .impacto(
            id_iniciativa,
            TipoImpacto::Generacion,
            AtributoImpacto::Estimado,
            "2024-03-15",
            "1234.56",
        )
        .await;

    let stored = db.services.impactos.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.id_iniciativa, id_iniciativa);
    assert_eq!(stored.tipo_impacto, TipoImpacto::Generacion);
    assert_eq!(stored.atributo_impacto, AtributoImpacto::Estimado);
    assert_eq!(stored.fecha_impacto, date("2024-03-15"));
    assert_eq!(stored.impacto, Decimal::new(123_456, 2));
}

#[tokio::test]
async fn test_impacto_queries() {
    let db = TestDb::new().await;
    let repo = &db.services.impactos;
    let owner = db.user("Ana", "ana@finimpact.com", Rol::Analista).await;
    let mine = db.iniciativa("Alpha", Some(owner.id_usuario())).await;
    let other = db.iniciativa("Beta", None).await;

    db.impacto(mine, TipoImpacto::Maquinaria, AtributoImpacto::Real, "2024-01-10", "100")
        .await;
    db.impacto(mine, TipoImpacto::Generacion, AtributoImpacto::Estimado, "2024-02-10", "50")
        .await;
    db.impacto(other, TipoImpacto::Maquinaria, AtributoImpacto::Real, "2024-03-10", "25")
        .await;

    assert_eq!(repo.find_all().await.unwrap().len(), 3);

    let by_iniciativa = repo.find_by_iniciativa(mine).await.unwrap();
    let fechas: Vec<_> = by_iniciativa.iter().map(|i| i.fecha_impacto).collect();
    assert_eq!(fechas, vec![date("2024-02-10"), date("2024-01-10")]);

    assert_eq!(repo.find_by_owner(owner.id_usuario()).await.unwrap().len(), 2);
    assert_eq!(repo.find_by_iniciativa_ids(&[mine, other]).await.unwrap().len(), 3);
    assert!(repo.find_by_iniciativa_ids(&[]).await.unwrap().is_empty());
    assert_eq!(
        repo.find_by_tipo_impacto(TipoImpacto::Maquinaria)
            .await
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        repo.find_by_atributo_impacto(AtributoImpacto::Estimado)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        repo.find_by_fecha_range(date("2024-01-01"), date("2024-02-10"))
            .await
            .unwrap()
            .len(),
        2
    );

    let filtered = repo
        .find_by_filters(
            Some(TipoImpacto::Maquinaria),
            Some(AtributoImpacto::Real),
            None,
            Some(date("2024-02-01")),
            None,
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id_iniciativa, other);
}

#[tokio::test]
async fn test_impacto_update_and_delete() {
    let db = TestDb::new().await;
    let repo = &db.services.impactos;
    let id_iniciativa = db.iniciativa("Alpha", None).await;
    let id = db
        .impacto(id_iniciativa, TipoImpacto::Maquinaria, AtributoImpacto::Real, "2024-01-10", "100")
        .await;

    let mut impacto = repo.find_by_id(id).await.unwrap().unwrap();
    impacto.multiplicador = finimpact_services::Multiplicador::Negativo;
    impacto.impacto = Decimal::new(7550, 2);
    assert!(repo.update(&impacto).await.unwrap());

    let stored = repo.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.impacto_calculado(), Decimal::new(-7550, 2));

    assert!(repo.delete(id).await.unwrap());
    assert!(!repo.delete(id).await.unwrap());
}

#[tokio::test]
async fn test_sum_and_statistics() {
    let db = TestDb::new().await;
    let repo = &db.services.impactos;
    let id = db.iniciativa("Alpha", None).await;

    assert_eq!(
        repo.sum_by_atributo_and_fecha(AtributoImpacto::Real, date("2024-01-01"), date("2024-12-31"))
            .await
            .unwrap(),
        Decimal::ZERO
    );

    db.impacto(id, TipoImpacto::Maquinaria, AtributoImpacto::Real, "2024-01-10", "100.25")
        .await;
    db.impacto(id, TipoImpacto::Maquinaria, AtributoImpacto::Real, "2024-05-10", "50")
        .await;
    db.impacto(id, TipoImpacto::Generacion, AtributoImpacto::Real, "2025-01-10", "999")
        .await;

    let mut negativo = repo.find_all().await.unwrap();
    negativo.sort_by_key(|i| i.fecha_impacto);
    let mut second = negativo[1].clone();
    second.multiplicador = finimpact_services::Multiplicador::Negativo;
    repo.update(&second).await.unwrap();

    assert_eq!(
        repo.sum_by_atributo_and_fecha(AtributoImpacto::Real, date("2024-01-01"), date("2024-12-31"))
            .await
            .unwrap(),
        Decimal::new(5025, 2)
    );

    let stats = repo.estadisticas_por_tipo().await.unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].tipo_impacto, TipoImpacto::Generacion);
    assert_eq!(stats[0].cantidad, 1);
    assert_eq!(stats[0].total, Decimal::from(999));
    assert_eq!(stats[1].cantidad, 2);
    assert_eq!(stats[1].total, Decimal::new(5025, 2));
}

#[tokio::test]
async fn test_repositories_return_connections_to_pool() {
    let db = TestDb::new().await;
    let id = db.iniciativa("Alpha", None).await;
    db.services.impactos.find_by_iniciativa(id).await.unwrap();
    db.services.usuarios.find_all().await.unwrap();

    let stats = db.pool.stats();
    assert_eq!(stats.checked_out, 0);
    assert_eq!(stats.idle, stats.pooled);
}
