//! Receipt documents for sales.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::PosEngine;
use crate::auth::Principal;
use crate::error::EngineResult;
use crate::retry::retry_on_conflict;
use receets_core::receipt::{receipt_url, Receipt};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDocument {
    pub receipt: Receipt,
    pub receipt_url: String,
}

impl PosEngine {
    /// Builds the receipt for a sale and assigns its URL on first request.
    ///
    /// Readable by the owning merchant and the linked customer.
    #[instrument(skip_all, fields(sale_id = %sale_id))]
    pub async fn generate_receipt(
        &self,
        principal: &Principal,
        sale_id: &str,
    ) -> EngineResult<ReceiptDocument> {
        let mut sale = self.load_sale(sale_id).await?;
        principal.ensure_can_view(&sale)?;

        let merchant = self.load_merchant(&sale.merchant_id).await?;
        let location = self
            .db
            .merchants()
            .get_location(&sale.location_id)
            .await?;
        let customer = match sale.customer_id.as_deref() {
            Some(id) => self.db.customers().get_by_id(id).await?,
            None => None,
        };

        if sale.receipt_url.is_none() {
            let url = receipt_url(&self.config.receipt_url_prefix, &sale.id);
            let url = &url;
            let _guard = self.locks.lock(sale_id).await;
            sale = retry_on_conflict(&self.config.conflict_retry, sale_id, move || async move {
                let mut sale = self.load_sale(sale_id).await?;
                if sale.receipt_url.is_none() {
                    sale.receipt_url = Some(url.clone());
                    sale.updated_at = Utc::now();
                    self.db.sales().save(&mut sale).await?;
                }
                Ok(sale)
            })
            .await?;
            info!(sale_id = %sale.id, url = %url, "Receipt URL assigned");
        } else {
            debug!("Receipt URL already assigned");
        }

        let receipt = Receipt::build(&sale, &merchant, location.as_ref(), customer.as_ref());
        Ok(ReceiptDocument {
            receipt_url: sale.receipt_url.clone().unwrap_or_default(),
            receipt,
        })
    }
}
