//! # Sale Operations
//!
//! Opening, editing, voiding and reading sales.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::PosEngine;
use crate::auth::Principal;
use crate::error::{EngineError, EngineResult};
use crate::ids;
use crate::retry::retry_on_conflict;
use receets_core::lifecycle::NewSale;
use receets_core::totals::{build_line_items, LineItemInput};
use receets_core::{PromoCode, Sale, SaleStatus, SaleType};
use receets_db::{Page, SaleFilter, SortField, SortOrder};

/// Attempts at finding a free sale number before giving up.
const SALE_NUMBER_ATTEMPTS: u32 = 3;

const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// Requests & Responses
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateSale {
    pub location_id: String,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
    #[serde(default, rename = "type")]
    pub sale_type: SaleType,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
    pub promo_code: Option<PromoCode>,
    pub notes: Option<String>,
    pub cashier_id: Option<String>,
    pub cashier_name: Option<String>,
}

/// Changes to a sale. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSale {
    pub line_items: Option<Vec<LineItemInput>>,
    pub promo_code: Option<PromoCode>,
    /// Drops the current promo code.
    #[serde(default)]
    pub remove_promo_code: bool,
    pub notes: Option<String>,
    pub status: Option<SaleStatus>,
}

impl UpdateSale {
    fn is_empty(&self) -> bool {
        self.line_items.is_none()
            && self.promo_code.is_none()
            && !self.remove_promo_code
            && self.notes.is_none()
            && self.status.is_none()
    }
}

/// Filters a merchant can apply to its own sales.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantSalesQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub sale_type: Option<SaleType>,
    pub status: Option<SaleStatus>,
    pub location_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_code: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Filters a customer can apply to their own purchases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSalesQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub sale_type: Option<SaleType>,
    pub status: Option<SaleStatus>,
    pub merchant_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePage {
    pub sales: Vec<Sale>,
    pub pagination: Pagination,
}

/// Parses paging parameters. Page defaults to 1, limit to 10 (max 100),
/// sort to `createdAt desc`.
pub(crate) fn build_page(
    page: Option<u32>,
    limit: Option<u32>,
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> EngineResult<Page> {
    let defaults = Page::default();
    let page = page.unwrap_or(defaults.page);
    if page == 0 {
        return Err(EngineError::validation("page must be at least 1"));
    }
    let limit = limit.unwrap_or(defaults.limit);
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(EngineError::validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        )));
    }

    let sort = match sort_by {
        None | Some("createdAt") => SortField::CreatedAt,
        Some("total") => SortField::Total,
        Some("saleNumber") => SortField::SaleNumber,
        Some(other) => {
            return Err(EngineError::validation(format!(
                "Unknown sortBy '{}'. Valid options: createdAt, total, saleNumber",
                other
            )))
        }
    };
    let order = match sort_order.map(str::to_lowercase).as_deref() {
        None | Some("desc") => SortOrder::Desc,
        Some("asc") => SortOrder::Asc,
        Some(other) => {
            return Err(EngineError::validation(format!(
                "Unknown sortOrder '{}'. Valid options: asc, desc",
                other
            )))
        }
    };

    Ok(Page {
        page,
        limit,
        sort,
        order,
    })
}

fn pagination(total: i64, page: &Page) -> Pagination {
    let limit = i64::from(page.limit);
    Pagination {
        total,
        page: page.page,
        limit: page.limit,
        pages: (total + limit - 1) / limit,
    }
}

// =============================================================================
// Operations
// =============================================================================

impl PosEngine {
    /// Opens a draft sale at one of the merchant's locations.
    ///
    /// ## Errors
    /// - `Permission` unless the principal is a merchant
    /// - `NotFound` for an unknown merchant, location or customer
    /// - `Validation` for bad line items, or when asked for a return sale
    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn initiate_sale(
        &self,
        principal: &Principal,
        request: InitiateSale,
    ) -> EngineResult<Sale> {
        debug!(location_id = %request.location_id, items = request.line_items.len(), "initiate_sale");

        let merchant_id = principal.require_merchant()?;
        if request.sale_type == SaleType::Return {
            return Err(EngineError::validation(
                "Return sales are created by processing a return against the original sale",
            ));
        }

        let merchant = self.load_merchant(merchant_id).await?;
        let location = self
            .load_merchant_location(&merchant.id, &request.location_id)
            .await?;
        let customer = self
            .resolve_customer(request.customer_id.as_deref(), request.customer_code.as_deref())
            .await?;

        let line_items = build_line_items(&request.line_items, request.sale_type)?;
        let now = Utc::now();
        let sale = Sale::new_draft(
            NewSale {
                id: ids::new_id(),
                sale_number: ids::sale_number(request.sale_type.number_prefix(), now),
                merchant_id: merchant.id,
                location_id: location.id,
                customer_id: customer.as_ref().map(|c| c.id.clone()),
                customer_code: customer.map(|c| c.customer_code).or(request.customer_code),
                sale_type: request.sale_type,
                line_items,
                promo_code: request.promo_code,
                original_sale_id: None,
                notes: request.notes,
                cashier_id: request.cashier_id,
                cashier_name: request.cashier_name,
            },
            now,
        )?;

        let sale = self.insert_numbered(sale).await?;
        info!(
            sale_id = %sale.id,
            sale_number = %sale.sale_number,
            total_cents = sale.total_cents,
            "Sale initiated"
        );
        Ok(sale)
    }

    /// Inserts a new sale, drawing a fresh number if its number is taken.
    pub(crate) async fn insert_numbered(&self, mut sale: Sale) -> EngineResult<Sale> {
        let mut attempt = 1;
        loop {
            match self.db.sales().insert(&sale).await {
                Ok(()) => return Ok(sale),
                Err(e)
                    if e.is_unique_violation_on("sales.sale_number")
                        && attempt < SALE_NUMBER_ATTEMPTS =>
                {
                    debug!(sale_number = %sale.sale_number, "Sale number taken, drawing another");
                    sale.sale_number = ids::sale_number(sale.sale_type.number_prefix(), Utc::now());
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Edits line items, promo code, notes or status of a sale.
    ///
    /// Status is applied last, so a request that adds items and asks for
    /// `completed` is judged against the new total. Repricing a part-paid
    /// sale down to what is already paid completes it.
    #[instrument(skip_all, fields(sale_id = %sale_id))]
    pub async fn update_sale(
        &self,
        principal: &Principal,
        sale_id: &str,
        update: UpdateSale,
    ) -> EngineResult<Sale> {
        debug!(?update, "update_sale");
        principal.require_merchant()?;

        let update = &update;
        let _guard = self.locks.lock(sale_id).await;
        let sale = retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
            let mut sale = self.load_sale(sale_id).await?;
            principal.ensure_merchant_owner(&sale.merchant_id)?;
            if update.is_empty() {
                return Ok(sale);
            }

            let now = Utc::now();
            if let Some(notes) = &update.notes {
                sale.set_notes(Some(notes.clone()), now)?;
            }
            let items = match &update.line_items {
                Some(inputs) => Some(build_line_items(inputs, sale.sale_type)?),
                None => None,
            };
            let promo = if update.remove_promo_code {
                Some(None)
            } else {
                update.promo_code.clone().map(Some)
            };
            sale.revise_pricing(items, promo, now)?;
            if let Some(status) = update.status {
                sale.request_status(status, now)?;
            }

            self.db.sales().save(&mut sale).await?;
            Ok(sale)
        })
        .await?;

        info!(
            sale_id = %sale.id,
            status = %sale.status,
            total_cents = sale.total_cents,
            "Sale updated"
        );
        Ok(sale)
    }

    /// Voids a sale that has not been paid.
    ///
    /// ## Errors
    /// - `InvalidState` for a completed sale with payments (issue a return),
    ///   or a sale that is already voided or refunded
    #[instrument(skip_all, fields(sale_id = %sale_id))]
    pub async fn void_sale(
        &self,
        principal: &Principal,
        sale_id: &str,
        reason: Option<&str>,
    ) -> EngineResult<Sale> {
        debug!(?reason, "void_sale");
        principal.require_merchant()?;

        let _guard = self.locks.lock(sale_id).await;
        let sale = retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
            let mut sale = self.load_sale(sale_id).await?;
            principal.ensure_merchant_owner(&sale.merchant_id)?;
            sale.void(reason, Utc::now())?;
            self.db.sales().save(&mut sale).await?;
            Ok(sale)
        })
        .await?;

        info!(sale_id = %sale.id, "Sale voided");
        Ok(sale)
    }

    /// Fetches a sale for its merchant or its linked customer.
    #[instrument(skip_all, fields(sale_id = %sale_id))]
    pub async fn get_sale(&self, principal: &Principal, sale_id: &str) -> EngineResult<Sale> {
        let sale = self.load_sale(sale_id).await?;
        principal.ensure_can_view(&sale)?;
        Ok(sale)
    }

    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn list_merchant_sales(
        &self,
        principal: &Principal,
        query: MerchantSalesQuery,
    ) -> EngineResult<SalePage> {
        let merchant_id = principal.require_merchant()?;
        let page = build_page(
            query.page,
            query.limit,
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
        )?;
        let filter = SaleFilter {
            merchant_id: Some(merchant_id.to_string()),
            customer_id: query.customer_id,
            customer_code: query.customer_code,
            location_id: query.location_id,
            sale_type: query.sale_type,
            status: query.status,
            created_from: query.start_date,
            created_to: query.end_date,
        };

        let (sales, total) = self.db.sales().list(&filter, &page).await?;
        debug!(total, returned = sales.len(), "Listed merchant sales");
        Ok(SalePage {
            sales,
            pagination: pagination(total, &page),
        })
    }

    #[instrument(skip_all, fields(principal = %principal))]
    pub async fn list_customer_sales(
        &self,
        principal: &Principal,
        query: CustomerSalesQuery,
    ) -> EngineResult<SalePage> {
        let customer_id = principal.require_customer()?;
        let page = build_page(
            query.page,
            query.limit,
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
        )?;
        let filter = SaleFilter {
            merchant_id: query.merchant_id,
            customer_id: Some(customer_id.to_string()),
            sale_type: query.sale_type,
            status: query.status,
            created_from: query.start_date,
            created_to: query.end_date,
            ..SaleFilter::default()
        };

        let (sales, total) = self.db.sales().list(&filter, &page).await?;
        debug!(total, returned = sales.len(), "Listed customer sales");
        Ok(SalePage {
            sales,
            pagination: pagination(total, &page),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
