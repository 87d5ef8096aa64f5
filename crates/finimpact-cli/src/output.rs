//! Terminal rendering of service results

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use finimpact_connection::PoolStats;
use finimpact_services::{DashboardMetrics, EstadisticaTipo, Impacto, Iniciativa, Usuario};
use serde::Serialize;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn usuarios(items: &[Usuario]) -> Table {
    let mut t = table(&["ID", "Name", "Email", "Role", "Active"]);
    for u in items {
        t.add_row(vec![
            u.id_usuario.to_string(),
            u.nombre_completo.clone(),
            u.email.clone(),
            u.rol.to_string(),
            if u.activo { "yes" } else { "no" }.to_string(),
        ]);
    }
    t
}

pub fn iniciativas(items: &[Iniciativa]) -> Table {
    let mut t = table(&[
        "ID", "Name", "Type", "State", "Risk", "Start", "End", "Owner",
    ]);
    for i in items {
        t.add_row(vec![
            i.id_iniciativa.to_string(),
            i.nombre.clone(),
            i.tipo.clone(),
            i.estado.to_string(),
            i.riesgo.to_string(),
            or_dash(i.fecha_inicio),
            or_dash(i.fecha_fin),
            or_dash(i.id_owner),
        ]);
    }
    t
}

pub fn impactos(items: &[Impacto]) -> Table {
    let mut t = table(&[
        "ID",
        "Initiative",
        "Type",
        "Attribute",
        "Sign",
        "Date",
        "Amount",
        "Signed",
    ]);
    for i in items {
        t.add_row(vec![
            i.id_impacto.to_string(),
            i.id_iniciativa.to_string(),
            i.tipo_impacto.to_string(),
            i.atributo_impacto.to_string(),
            i.multiplicador.to_string(),
            i.fecha_impacto.to_string(),
            i.impacto.to_string(),
            i.impacto_calculado().to_string(),
        ]);
    }
    t
}

pub fn estadisticas(items: &[EstadisticaTipo]) -> Table {
    let mut t = table(&["Type", "Count", "Total"]);
    for e in items {
        t.add_row(vec![
            e.tipo_impacto.to_string(),
            e.cantidad.to_string(),
            e.total.to_string(),
        ]);
    }
    t
}

/// Key figures followed by one row per chart series entry
pub fn metrics(m: &DashboardMetrics) -> Table {
    let mut t = table(&["Metric", "Value"]);
    t.add_row(vec!["Initiatives".to_string(), m.total_iniciativas.to_string()]);
    t.add_row(vec!["Active".to_string(), m.activas.to_string()]);
    t.add_row(vec!["Finished".to_string(), m.finalizadas.to_string()]);
    t.add_row(vec!["High risk".to_string(), m.riesgo_alto.to_string()]);
    t.add_row(vec!["Total impact".to_string(), m.impacto_total.to_string()]);
    t.add_row(vec!["Average impact".to_string(), m.impacto_promedio.to_string()]);
    t.add_row(vec!["Efficiency %".to_string(), m.eficiencia.to_string()]);

    for (estado, count) in &m.por_estado {
        t.add_row(vec![format!("State: {}", estado), count.to_string()]);
    }
    for (riesgo, count) in &m.por_riesgo {
        t.add_row(vec![format!("Risk: {}", riesgo), count.to_string()]);
    }
    for (tipo, total) in &m.impacto_por_tipo {
        t.add_row(vec![format!("Impact: {}", tipo), total.to_string()]);
    }
    for (mes, total) in &m.impacto_mensual {
        t.add_row(vec![format!("Month: {}", mes), total.to_string()]);
    }
    t
}

pub fn pool_stats(stats: &PoolStats) -> Table {
    let mut t = table(&["Pool", "Value"]);
    let rows = [
        ("Capacity", stats.capacity.to_string()),
        ("Pooled", stats.pooled.to_string()),
        ("Idle", stats.idle.to_string()),
        ("Checked out", stats.checked_out.to_string()),
        ("Overflow active", stats.overflow_active.to_string()),
        ("Overflow total", stats.overflow_total.to_string()),
        ("Connections opened", stats.connections_opened.to_string()),
        ("Waiting", stats.waiting.to_string()),
        (
            "Utilization",
            format!("{:.0}%", stats.utilization() * 100.0),
        ),
    ];
    for (name, value) in rows {
        t.add_row(vec![name.to_string(), value]);
    }
    t
}

/// Print `value` as pretty JSON, or render it with `render` as a table
pub fn emit<T: Serialize + ?Sized>(
    json: bool,
    value: &T,
    render: impl FnOnce(&T) -> Table,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finimpact_services::{AtributoImpacto, Multiplicador, Rol, TipoImpacto};
    use rust_decimal::Decimal;

    #[test]
    fn test_usuarios_table() {
        let rendered = usuarios(&[Usuario {
            id_usuario: 3,
            nombre_completo: "Maria Viewer".into(),
            email: "viewer@finimpact.com".into(),
            password_hash: "secret-hash".into(),
            rol: Rol::Viewer,
            activo: true,
        }])
        .to_string();
        assert!(rendered.contains("viewer@finimpact.com"));
        assert!(rendered.contains("viewer"));
        assert!(!rendered.contains("secret-hash"));
    }

    #[test]
    fn test_iniciativas_table_marks_missing_values() {
        let rendered = iniciativas(&[Iniciativa::nueva("Alpha", "Operativa")]).to_string();
        assert!(rendered.contains("Alpha"));
        assert!(rendered.contains("planeado"));
        assert!(rendered.contains('-'));
    }

    #[test]
    fn test_impactos_table_shows_signed_amount() {
        let impacto = Impacto::nuevo(
            1,
            TipoImpacto::Generacion,
            AtributoImpacto::Real,
            Multiplicador::Negativo,
            chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            Decimal::new(12_050, 2),
        );
        let rendered = impactos(&[impacto]).to_string();
        assert!(rendered.contains("Generación"));
        assert!(rendered.contains("-120.50"));
    }

    #[test]
    fn test_metrics_table_lists_series() {
        let m = DashboardMetrics::compute(&[Iniciativa::nueva("Alpha", "Operativa")], &[]);
        let rendered = metrics(&m).to_string();
        assert!(rendered.contains("State: planeado"));
        assert!(rendered.contains("Risk: medio"));
    }

    #[test]
    fn test_pool_stats_table() {
        let stats = PoolStats {
            capacity: 5,
            pooled: 5,
            idle: 4,
            checked_out: 1,
            ..Default::default()
        };
        let rendered = pool_stats(&stats).to_string();
        assert!(rendered.contains("Checked out"));
        assert!(rendered.contains("20%"));
    }
}
