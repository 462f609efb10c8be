//! Supplier, product and invoice storage.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};

use super::{parse_column, Database};
use crate::error::{AppError, AppResult};
use crate::models::{
    Invoice, InvoiceStatus, ListQuery, NewInvoice, NewProduct, NewSupplier, Page, Product,
    Supplier, MAX_STOCK_UNITS,
};

const SUPPLIER_COLUMNS: &str =
    "id, name, contact_name, email, phone, address, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, sku, category, supplier_id, unit, quantity, \
     reorder_level, max_stock, unit_price, daily_usage, created_at, updated_at";

const INVOICE_COLUMNS: &str =
    "id, supplier_id, invoice_number, amount, issued_on, due_on, status, paid_on, created_at";

fn supplier_from_row(row: &Row<'_>) -> rusqlite::Result<Supplier> {
    Ok(Supplier {
        id: row.get(0)?,
        name: row.get(1)?,
        contact_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        sku: row.get(2)?,
        category: row.get(3)?,
        supplier_id: row.get(4)?,
        unit: row.get(5)?,
        quantity: row.get(6)?,
        reorder_level: row.get(7)?,
        max_stock: row.get(8)?,
        unit_price: row.get(9)?,
        daily_usage: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        supplier_id: row.get(1)?,
        invoice_number: row.get(2)?,
        amount: row.get(3)?,
        issued_on: row.get(4)?,
        due_on: row.get(5)?,
        status: parse_column(row, 6)?,
        paid_on: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Runs a filtered, paginated SELECT and its COUNT over the same conditions.
///
/// `conditions` are SQL fragments using positional `?` placeholders bound
/// in order from `args`.
#[allow(clippy::too_many_arguments)]
pub(super) fn query_page<T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    order_column: &str,
    conditions: &[String],
    args: Vec<Value>,
    query: &ListQuery,
    max_page_size: usize,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> AppResult<Page<T>> {
    let limit = query.limit(max_page_size);
    let offset = query.offset();
    let where_clause = if conditions.is_empty() {
        "1 = 1".to_string()
    } else {
        conditions.join(" AND ")
    };

    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table, where_clause);
    let total: i64 = conn.query_row(&count_sql, params_from_iter(args.iter()), |row| {
        row.get(0)
    })?;

    let sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {} {}, id {} LIMIT {} OFFSET {}",
        columns,
        table,
        where_clause,
        order_column,
        query.order_sql(),
        query.order_sql(),
        limit,
        offset
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(args.iter()), map)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        items,
        total,
        limit,
        offset,
    })
}

fn supplier_exists(conn: &Connection, id: i64) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM suppliers WHERE id = ?1", params![id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

impl Database {
    // === Suppliers ===

    pub fn create_supplier(&self, supplier: &NewSupplier) -> AppResult<Supplier> {
        let id = {
            let conn = self.lock();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO suppliers (name, contact_name, email, phone, address, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    supplier.name,
                    supplier.contact_name,
                    supplier.email,
                    supplier.phone,
                    supplier.address,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_supplier(id)
    }

    pub fn get_supplier(&self, id: i64) -> AppResult<Supplier> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM suppliers WHERE id = ?1", SUPPLIER_COLUMNS),
            params![id],
            supplier_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Supplier", id))
    }

    /// Lists suppliers, searching name, contact and email.
    pub fn list_suppliers(&self, query: &ListQuery, max_page_size: usize) -> AppResult<Page<Supplier>> {
        let mut conditions = Vec::new();
        let mut args = Vec::new();
        if let Some(pattern) = query.search_pattern() {
            conditions.push(
                "(name LIKE ? ESCAPE '\\' OR contact_name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            args.extend(std::iter::repeat(Value::Text(pattern)).take(3));
        }

        let conn = self.lock();
        query_page(
            &conn,
            "suppliers",
            SUPPLIER_COLUMNS,
            "name",
            &conditions,
            args,
            query,
            max_page_size,
            supplier_from_row,
        )
    }

    pub fn all_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM suppliers ORDER BY id",
            SUPPLIER_COLUMNS
        ))?;
        let rows = stmt.query_map([], supplier_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn update_supplier(&self, id: i64, supplier: &NewSupplier) -> AppResult<Supplier> {
        {
            let conn = self.lock();
            let affected = conn.execute(
                "UPDATE suppliers SET name = ?1, contact_name = ?2, email = ?3, phone = ?4,
                        address = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    supplier.name,
                    supplier.contact_name,
                    supplier.email,
                    supplier.phone,
                    supplier.address,
                    Utc::now(),
                    id,
                ],
            )?;
            if affected == 0 {
                return Err(AppError::not_found("Supplier", id));
            }
        }
        self.get_supplier(id)
    }

    /// Deletes a supplier. Products keep their rows with the link cleared;
    /// suppliers with invoices cannot be deleted.
    pub fn delete_supplier(&self, id: i64) -> AppResult<()> {
        let conn = self.lock();
        let invoices: i64 = conn.query_row(
            "SELECT COUNT(*) FROM invoices WHERE supplier_id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        if invoices > 0 {
            return Err(AppError::Conflict(format!(
                "Supplier {} has {} invoice(s) and cannot be deleted",
                id, invoices
            )));
        }
        let affected = conn.execute("DELETE FROM suppliers WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(AppError::not_found("Supplier", id));
        }
        Ok(())
    }

    // === Products ===

    pub fn create_product(&self, product: &NewProduct) -> AppResult<Product> {
        let id = {
            let conn = self.lock();
            if let Some(supplier_id) = product.supplier_id {
                if !supplier_exists(&conn, supplier_id)? {
                    return Err(AppError::not_found("Supplier", supplier_id));
                }
            }
            let now = Utc::now();
            conn.execute(
                "INSERT INTO products (name, sku, category, supplier_id, unit, quantity, reorder_level,
                                       max_stock, unit_price, daily_usage, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    product.name,
                    product.sku,
                    product.category,
                    product.supplier_id,
                    product.unit,
                    product.quantity,
                    product.reorder_level,
                    product.max_stock,
                    product.unit_price,
                    product.daily_usage,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_product(id)
    }

    pub fn get_product(&self, id: i64) -> AppResult<Product> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
            params![id],
            product_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Product", id))
    }

    /// Lists products, searching name and SKU, optionally within a category.
    pub fn list_products(
        &self,
        query: &ListQuery,
        category: Option<&str>,
        max_page_size: usize,
    ) -> AppResult<Page<Product>> {
        let mut conditions = Vec::new();
        let mut args = Vec::new();
        if let Some(pattern) = query.search_pattern() {
            conditions.push("(name LIKE ? ESCAPE '\\' OR sku LIKE ? ESCAPE '\\')".to_string());
            args.extend(std::iter::repeat(Value::Text(pattern)).take(2));
        }
        if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
            conditions.push("category = ? COLLATE NOCASE".to_string());
            args.push(Value::Text(category.to_string()));
        }

        let conn = self.lock();
        query_page(
            &conn,
            "products",
            PRODUCT_COLUMNS,
            "updated_at",
            &conditions,
            args,
            query,
            max_page_size,
            product_from_row,
        )
    }

    /// Every product, for analytics.
    pub fn all_products(&self) -> AppResult<Vec<Product>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products ORDER BY id",
            PRODUCT_COLUMNS
        ))?;
        let rows = stmt.query_map([], product_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn update_product(&self, id: i64, product: &NewProduct) -> AppResult<Product> {
        {
            let conn = self.lock();
            if let Some(supplier_id) = product.supplier_id {
                if !supplier_exists(&conn, supplier_id)? {
                    return Err(AppError::not_found("Supplier", supplier_id));
                }
            }
            let affected = conn.execute(
                "UPDATE products SET name = ?1, sku = ?2, category = ?3, supplier_id = ?4, unit = ?5,
                        quantity = ?6, reorder_level = ?7, max_stock = ?8, unit_price = ?9,
                        daily_usage = ?10, updated_at = ?11
                 WHERE id = ?12",
                params![
                    product.name,
                    product.sku,
                    product.category,
                    product.supplier_id,
                    product.unit,
                    product.quantity,
                    product.reorder_level,
                    product.max_stock,
                    product.unit_price,
                    product.daily_usage,
                    Utc::now(),
                    id,
                ],
            )?;
            if affected == 0 {
                return Err(AppError::not_found("Product", id));
            }
        }
        self.get_product(id)
    }

    /// Adds `delta` (may be negative) to a product's quantity.
    pub fn adjust_stock(&self, id: i64, delta: i64) -> AppResult<Product> {
        {
            let conn = self.lock();
            let quantity: i64 = conn
                .query_row(
                    "SELECT quantity FROM products WHERE id = ?1",
                    params![id],
                    |r| r.get(0),
                )
                .optional()?
                .ok_or_else(|| AppError::not_found("Product", id))?;

            let updated = quantity
                .checked_add(delta)
                .filter(|q| (0..=MAX_STOCK_UNITS).contains(q))
                .ok_or_else(|| {
                    AppError::validation(format!(
                        "Stock must stay between 0 and {} (have {}, change {})",
                        MAX_STOCK_UNITS, quantity, delta
                    ))
                })?;

            conn.execute(
                "UPDATE products SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                params![updated, Utc::now(), id],
            )?;
            tracing::debug!(product_id = id, from = quantity, to = updated, "Stock adjusted");
        }
        self.get_product(id)
    }

    pub fn delete_product(&self, id: i64) -> AppResult<()> {
        let conn = self.lock();
        let affected = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(AppError::not_found("Product", id));
        }
        Ok(())
    }

    // === Invoices ===

    pub fn create_invoice(&self, invoice: &NewInvoice) -> AppResult<Invoice> {
        let id = {
            let conn = self.lock();
            if !supplier_exists(&conn, invoice.supplier_id)? {
                return Err(AppError::not_found("Supplier", invoice.supplier_id));
            }
            conn.execute(
                "INSERT INTO invoices (supplier_id, invoice_number, amount, issued_on, due_on, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    invoice.supplier_id,
                    invoice.invoice_number,
                    invoice.amount,
                    invoice.issued_on,
                    invoice.due_on,
                    InvoiceStatus::Pending.as_str(),
                    Utc::now(),
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_invoice(id)
    }

    pub fn get_invoice(&self, id: i64) -> AppResult<Invoice> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
            params![id],
            invoice_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Invoice", id))
    }

    /// Lists invoices by issue date, searching the invoice number.
    pub fn list_invoices(
        &self,
        query: &ListQuery,
        status: Option<InvoiceStatus>,
        supplier_id: Option<i64>,
        max_page_size: usize,
    ) -> AppResult<Page<Invoice>> {
        let mut conditions = Vec::new();
        let mut args = Vec::new();
        if let Some(pattern) = query.search_pattern() {
            conditions.push("invoice_number LIKE ? ESCAPE '\\'".to_string());
            args.push(Value::Text(pattern));
        }
        if let Some(status) = status {
            conditions.push("status = ?".to_string());
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(supplier_id) = supplier_id {
            conditions.push("supplier_id = ?".to_string());
            args.push(Value::Integer(supplier_id));
        }

        let conn = self.lock();
        query_page(
            &conn,
            "invoices",
            INVOICE_COLUMNS,
            "issued_on",
            &conditions,
            args,
            query,
            max_page_size,
            invoice_from_row,
        )
    }

    /// Every invoice, for analytics.
    pub fn all_invoices(&self) -> AppResult<Vec<Invoice>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM invoices ORDER BY issued_on, id",
            INVOICE_COLUMNS
        ))?;
        let rows = stmt.query_map([], invoice_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn mark_invoice_paid(&self, id: i64, paid_on: NaiveDate) -> AppResult<Invoice> {
        let invoice = self.get_invoice(id)?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::Conflict(format!("Invoice {} is already paid", id)));
        }
        if paid_on < invoice.issued_on {
            return Err(AppError::validation("paid_on must not be before issued_on"));
        }
        {
            let conn = self.lock();
            let affected = conn.execute(
                "UPDATE invoices SET status = ?1, paid_on = ?2 WHERE id = ?3 AND status = ?4",
                params![
                    InvoiceStatus::Paid.as_str(),
                    paid_on,
                    id,
                    InvoiceStatus::Pending.as_str()
                ],
            )?;
            // Another request paid it since the read above
            if affected == 0 {
                return Err(AppError::Conflict(format!("Invoice {} is already paid", id)));
            }
        }
        self.get_invoice(id)
    }

    pub fn delete_invoice(&self, id: i64) -> AppResult<()> {
        let conn = self.lock();
        let affected = conn.execute("DELETE FROM invoices WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(AppError::not_found("Invoice", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier(db: &Database, name: &str) -> Supplier {
        db.create_supplier(&NewSupplier {
            name: name.into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn new_product(sku: &str, quantity: i64) -> NewProduct {
        NewProduct {
            name: format!("Product {}", sku),
            sku: sku.into(),
            category: "Feed".into(),
            supplier_id: None,
            unit: "kg".into(),
            quantity,
            reorder_level: 10,
            max_stock: None,
            unit_price: 1.5,
            daily_usage: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_supplier_crud() {
        let db = Database::open_in_memory().unwrap();
        let created = supplier(&db, "Green Seeds");
        assert!(created.id > 0);

        let mut update = NewSupplier {
            name: "Green Seeds Ltd".into(),
            ..Default::default()
        };
        update.phone = Some("555".into());
        let updated = db.update_supplier(created.id, &update).unwrap();
        assert_eq!(updated.name, "Green Seeds Ltd");
        assert_eq!(updated.phone.as_deref(), Some("555"));
        assert!(updated.updated_at >= created.updated_at);

        db.delete_supplier(created.id).unwrap();
        assert!(matches!(
            db.get_supplier(created.id),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_supplier_search_and_paging() {
        let db = Database::open_in_memory().unwrap();
        for name in ["Alpha Feeds", "Beta Seeds", "Gamma Seeds"] {
            supplier(&db, name);
        }

        let query = ListQuery {
            search: Some("seeds".into()),
            order: Some("asc".into()),
            limit: Some(1),
            ..Default::default()
        };
        let page = db.list_suppliers(&query, 500).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Beta Seeds");
    }

    #[test]
    fn test_delete_supplier_with_invoices_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let s = supplier(&db, "Hay Co");
        db.create_invoice(&NewInvoice {
            supplier_id: s.id,
            invoice_number: "INV-1".into(),
            amount: 50.0,
            issued_on: date("2024-01-01"),
            due_on: date("2024-01-15"),
        })
        .unwrap();

        assert!(matches!(
            db.delete_supplier(s.id),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_delete_supplier_clears_product_link() {
        let db = Database::open_in_memory().unwrap();
        let s = supplier(&db, "Hay Co");
        let mut input = new_product("HAY-1", 5);
        input.supplier_id = Some(s.id);
        let product = db.create_product(&input).unwrap();
        assert_eq!(product.supplier_id, Some(s.id));

        db.delete_supplier(s.id).unwrap();
        assert_eq!(db.get_product(product.id).unwrap().supplier_id, None);
    }

    #[test]
    fn test_product_requires_known_supplier() {
        let db = Database::open_in_memory().unwrap();
        let mut input = new_product("X-1", 1);
        input.supplier_id = Some(99);
        assert!(matches!(
            db.create_product(&input),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_sku_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_product(&new_product("DUP", 1)).unwrap();
        assert!(matches!(
            db.create_product(&new_product("DUP", 2)),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_adjust_stock() {
        let db = Database::open_in_memory().unwrap();
        let product = db.create_product(&new_product("ST-1", 5)).unwrap();

        let updated = db.adjust_stock(product.id, 7).unwrap();
        assert_eq!(updated.quantity, 12);

        let updated = db.adjust_stock(product.id, -12).unwrap();
        assert_eq!(updated.quantity, 0);

        assert!(matches!(
            db.adjust_stock(product.id, -1),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            db.adjust_stock(product.id, MAX_STOCK_UNITS + 1),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            db.adjust_stock(999, 1),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_products_by_category() {
        let db = Database::open_in_memory().unwrap();
        db.create_product(&new_product("A", 1)).unwrap();
        let mut other = new_product("B", 1);
        other.category = "Tools".into();
        db.create_product(&other).unwrap();

        let page = db
            .list_products(&ListQuery::default(), Some("tools"), 500)
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].sku, "B");
    }

    #[test]
    fn test_invoice_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let s = supplier(&db, "Hay Co");
        let invoice = db
            .create_invoice(&NewInvoice {
                supplier_id: s.id,
                invoice_number: "INV-9".into(),
                amount: 250.0,
                issued_on: date("2024-02-01"),
                due_on: date("2024-03-01"),
            })
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.issued_on, date("2024-02-01"));

        let pending = db
            .list_invoices(&ListQuery::default(), Some(InvoiceStatus::Pending), None, 500)
            .unwrap();
        assert_eq!(pending.total, 1);

        assert!(db.mark_invoice_paid(invoice.id, date("2024-01-01")).is_err());
        let paid = db.mark_invoice_paid(invoice.id, date("2024-02-10")).unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.paid_on, Some(date("2024-02-10")));

        assert!(matches!(
            db.mark_invoice_paid(invoice.id, date("2024-02-11")),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_concurrent_payments_pay_once() {
        let db = Database::open_in_memory().unwrap();
        let s = supplier(&db, "Hay Co");
        let invoice = db
            .create_invoice(&NewInvoice {
                supplier_id: s.id,
                invoice_number: "INV-10".into(),
                amount: 90.0,
                issued_on: date("2024-02-01"),
                due_on: date("2024-03-01"),
            })
            .unwrap();

        let results: Vec<AppResult<Invoice>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u32)
                .map(|day| {
                    let db = &db;
                    scope.spawn(move || {
                        db.mark_invoice_paid(invoice.id, date("2024-02-10") + chrono::Duration::days(day.into()))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let paid: Vec<&Invoice> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(paid.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::Conflict(_))));
        assert_eq!(db.get_invoice(invoice.id).unwrap().paid_on, paid[0].paid_on);
    }

    #[test]
    fn test_invoice_needs_supplier() {
        let db = Database::open_in_memory().unwrap();
        let result = db.create_invoice(&NewInvoice {
            supplier_id: 42,
            invoice_number: "INV-1".into(),
            amount: 1.0,
            issued_on: date("2024-01-01"),
            due_on: date("2024-01-02"),
        });
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }
}
