//! Barley-plate storage.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, types::Value, OptionalExtension, Row};

use super::inventory::query_page;
use super::{parse_column, Database};
use crate::error::{AppError, AppResult};
use crate::models::{BarleyPlate, ListQuery, NewPlate, Page, PlateStage};

const PLATE_COLUMNS: &str = "id, plate_code, variety, sown_on, stage, tray_location, \
     seed_weight_g, yield_weight_g, harvested_on, notes, created_at, updated_at";

fn plate_from_row(row: &Row<'_>) -> rusqlite::Result<BarleyPlate> {
    Ok(BarleyPlate {
        id: row.get(0)?,
        plate_code: row.get(1)?,
        variety: row.get(2)?,
        sown_on: row.get(3)?,
        stage: parse_column(row, 4)?,
        tray_location: row.get(5)?,
        seed_weight_g: row.get(6)?,
        yield_weight_g: row.get(7)?,
        harvested_on: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl Database {
    /// Creates a plate in the `Sown` stage. `plate` must already be validated.
    pub fn create_plate(&self, plate: &NewPlate) -> AppResult<BarleyPlate> {
        let sown_on = plate
            .sown_on
            .ok_or_else(|| AppError::validation("sown_on is required"))?;
        let id = {
            let conn = self.lock();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO barley_plates (plate_code, variety, sown_on, stage, tray_location,
                                            seed_weight_g, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    plate.plate_code,
                    plate.variety,
                    sown_on,
                    PlateStage::Sown.as_str(),
                    plate.tray_location,
                    plate.seed_weight_g,
                    plate.notes,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_plate(id)
    }

    pub fn get_plate(&self, id: i64) -> AppResult<BarleyPlate> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM barley_plates WHERE id = ?1", PLATE_COLUMNS),
            params![id],
            plate_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Plate", id))
    }

    /// Lists plates by sowing date, searching code, variety and location.
    pub fn list_plates(
        &self,
        query: &ListQuery,
        stage: Option<PlateStage>,
        max_page_size: usize,
    ) -> AppResult<Page<BarleyPlate>> {
        let mut conditions = Vec::new();
        let mut args = Vec::new();
        if let Some(pattern) = query.search_pattern() {
            conditions.push(
                "(plate_code LIKE ? ESCAPE '\\' OR variety LIKE ? ESCAPE '\\' OR tray_location LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            args.extend(std::iter::repeat(Value::Text(pattern)).take(3));
        }
        if let Some(stage) = stage {
            conditions.push("stage = ?".to_string());
            args.push(Value::Text(stage.as_str().to_string()));
        }

        let conn = self.lock();
        query_page(
            &conn,
            "barley_plates",
            PLATE_COLUMNS,
            "sown_on",
            &conditions,
            args,
            query,
            max_page_size,
            plate_from_row,
        )
    }

    /// Every plate, for analytics.
    pub fn all_plates(&self) -> AppResult<Vec<BarleyPlate>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM barley_plates ORDER BY id",
            PLATE_COLUMNS
        ))?;
        let rows = stmt.query_map([], plate_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Saves the editable fields of a plate (not its stage).
    pub fn update_plate(&self, plate: &BarleyPlate) -> AppResult<BarleyPlate> {
        {
            let conn = self.lock();
            let affected = conn.execute(
                "UPDATE barley_plates SET variety = ?1, tray_location = ?2, seed_weight_g = ?3,
                        notes = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    plate.variety,
                    plate.tray_location,
                    plate.seed_weight_g,
                    plate.notes,
                    Utc::now(),
                    plate.id,
                ],
            )?;
            if affected == 0 {
                return Err(AppError::not_found("Plate", plate.id));
            }
        }
        self.get_plate(plate.id)
    }

    /// Moves a plate to `next`, enforcing the stage order.
    ///
    /// Harvesting requires a yield weight and records the harvest date
    /// (`harvested_on`, default `today`), which may not precede sowing.
    pub fn advance_plate(
        &self,
        id: i64,
        next: PlateStage,
        yield_weight_g: Option<f64>,
        harvested_on: Option<NaiveDate>,
        today: NaiveDate,
    ) -> AppResult<BarleyPlate> {
        let plate = self.get_plate(id)?;
        if !plate.stage.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: plate.stage.to_string(),
                to: next.to_string(),
            });
        }

        let (yield_weight_g, harvested_on) = if next == PlateStage::Harvested {
            let weight = yield_weight_g
                .ok_or_else(|| AppError::validation("yield_weight_g is required to harvest"))?;
            crate::models::non_negative("yield_weight_g", weight)?;
            let on = harvested_on.unwrap_or(today);
            if on < plate.sown_on {
                return Err(AppError::validation("harvested_on must not be before sown_on"));
            }
            (Some(weight), Some(on))
        } else {
            (plate.yield_weight_g, plate.harvested_on)
        };

        {
            let conn = self.lock();
            let affected = conn.execute(
                "UPDATE barley_plates SET stage = ?1, yield_weight_g = ?2, harvested_on = ?3,
                        updated_at = ?4
                 WHERE id = ?5 AND stage = ?6",
                params![
                    next.as_str(),
                    yield_weight_g,
                    harvested_on,
                    Utc::now(),
                    id,
                    plate.stage.as_str()
                ],
            )?;
            // The stage moved on since the read above
            if affected == 0 {
                return Err(AppError::Conflict(format!(
                    "Plate {} changed stage concurrently",
                    id
                )));
            }
        }
        tracing::debug!(plate_id = id, from = %plate.stage, to = %next, "Plate stage changed");
        self.get_plate(id)
    }

    pub fn delete_plate(&self, id: i64) -> AppResult<()> {
        let conn = self.lock();
        let affected = conn.execute("DELETE FROM barley_plates WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(AppError::not_found("Plate", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sow(db: &Database, code: &str) -> BarleyPlate {
        let input = NewPlate {
            plate_code: code.into(),
            variety: "Six-row".into(),
            sown_on: Some(date("2024-04-01")),
            tray_location: Some("Rack A".into()),
            seed_weight_g: 400.0,
            notes: None,
        };
        db.create_plate(&input.validate(date("2024-04-02")).unwrap())
            .unwrap()
    }

    #[test]
    fn test_create_and_list_plates() {
        let db = Database::open_in_memory().unwrap();
        sow(&db, "p-1");
        sow(&db, "p-2");

        let page = db
            .list_plates(&ListQuery::default(), Some(PlateStage::Sown), 500)
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|p| p.stage == PlateStage::Sown));

        let query = ListQuery {
            search: Some("P-2".into()),
            ..Default::default()
        };
        assert_eq!(db.list_plates(&query, None, 500).unwrap().total, 1);
    }

    #[test]
    fn test_duplicate_plate_code_conflicts() {
        let db = Database::open_in_memory().unwrap();
        sow(&db, "p-1");
        let input = NewPlate {
            plate_code: "P-1".into(),
            variety: "Two-row".into(),
            sown_on: Some(date("2024-04-01")),
            tray_location: None,
            seed_weight_g: 0.0,
            notes: None,
        };
        assert!(matches!(
            db.create_plate(&input),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_advance_through_harvest() {
        let db = Database::open_in_memory().unwrap();
        let plate = sow(&db, "p-1");
        let today = date("2024-04-09");

        for stage in [
            PlateStage::Germinating,
            PlateStage::Growing,
            PlateStage::Ready,
        ] {
            let updated = db.advance_plate(plate.id, stage, None, None, today).unwrap();
            assert_eq!(updated.stage, stage);
        }

        assert!(matches!(
            db.advance_plate(plate.id, PlateStage::Harvested, None, None, today),
            Err(AppError::Validation(_))
        ));

        let harvested = db
            .advance_plate(plate.id, PlateStage::Harvested, Some(2600.0), None, today)
            .unwrap();
        assert_eq!(harvested.stage, PlateStage::Harvested);
        assert_eq!(harvested.yield_weight_g, Some(2600.0));
        assert_eq!(harvested.harvested_on, Some(today));

        assert!(matches!(
            db.advance_plate(plate.id, PlateStage::Discarded, None, None, today),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_concurrent_terminal_moves_apply_once() {
        let db = Database::open_in_memory().unwrap();
        let plate = sow(&db, "p-9");
        let today = date("2024-04-09");
        for stage in [PlateStage::Germinating, PlateStage::Growing, PlateStage::Ready] {
            db.advance_plate(plate.id, stage, None, None, today).unwrap();
        }

        let results: Vec<AppResult<BarleyPlate>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let db = &db;
                    scope.spawn(move || {
                        if i % 2 == 0 {
                            db.advance_plate(plate.id, PlateStage::Harvested, Some(2000.0), None, today)
                        } else {
                            db.advance_plate(plate.id, PlateStage::Discarded, None, None, today)
                        }
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let applied: Vec<&BarleyPlate> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(applied.len(), 1);
        let stored = db.get_plate(plate.id).unwrap();
        assert_eq!(stored.stage, applied[0].stage);
        assert!(stored.stage.is_terminal());
        assert_eq!(stored.yield_weight_g.is_some(), stored.stage == PlateStage::Harvested);
    }

    #[test]
    fn test_skipping_stages_rejected() {
        let db = Database::open_in_memory().unwrap();
        let plate = sow(&db, "p-1");
        let result = db.advance_plate(plate.id, PlateStage::Ready, None, None, date("2024-04-05"));
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn test_update_plate_keeps_stage() {
        let db = Database::open_in_memory().unwrap();
        let mut plate = sow(&db, "p-1");
        db.advance_plate(plate.id, PlateStage::Germinating, None, None, date("2024-04-03"))
            .unwrap();

        plate.notes = Some("mould check".into());
        let updated = db.update_plate(&plate).unwrap();
        assert_eq!(updated.notes.as_deref(), Some("mould check"));
        assert_eq!(updated.stage, PlateStage::Germinating);
    }
}
