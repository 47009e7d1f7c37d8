use std::collections::HashMap;
use std::sync::Arc;

use base64::prelude::*;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::domain::settlement::SettlementNotice;
use crate::domain::transaction::PaymentTransaction;
use crate::error::PaymentError;
use crate::models::enums::{OrderStatus, PaymentMethod, TransactionStatus};
use crate::models::order::NewOrder;
use crate::models::payment::*;
use crate::payment::factory::GatewayRegistry;
use crate::payment::strategy::GatewayPaymentRequest;
use crate::repository::order_repository::OrderRepository;
use crate::repository::transaction_repository::TransactionRepository;
use crate::services::notification::{Notifier, PaymentSnapshot};

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Where the payer lands after the MoMo redirect.
    pub result_deeplink: String,
    pub momo_status: MomoConfigStatus,
}

/// Result of processing one settlement notice. `applied` is false for a
/// replay, in which case `transaction` is the row as already stored.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub transaction: PaymentTransaction,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvoicePolicy {
    Send,
    Skip,
}

pub struct PaymentService {
    transactions: Arc<dyn TransactionRepository>,
    orders: Arc<dyn OrderRepository>,
    gateways: Arc<GatewayRegistry>,
    notifier: Arc<dyn Notifier>,
    options: ServiceOptions,
}

impl PaymentService {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        orders: Arc<dyn OrderRepository>,
        gateways: Arc<GatewayRegistry>,
        notifier: Arc<dyn Notifier>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            transactions,
            orders,
            gateways,
            notifier,
            options,
        }
    }

    pub async fn create_payment(
        &self,
        method: PaymentMethod,
        request: CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, PaymentError> {
        // 1. 参数校验
        let (order_id, amount) = request.validate()?;
        let gateway = self.gateways.get(method)?;

        // 2. 订单不存在时建单并预留库存
        self.prepare_order(&order_id, amount, &request).await?;

        // 3. 调用支付渠道
        let transaction_ref = format!("{}_{}_{}", method.ref_prefix(), order_id, Utc::now().timestamp_millis());
        let customer_email = request
            .customer_email
            .clone()
            .or_else(|| request.order_data.as_ref().and_then(|d| d.customer_email.clone()));
        let description = request
            .order_description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Thanh toán đơn hàng {}", order_id));
        let extra_data = BASE64_STANDARD.encode(
            json!({ "orderId": order_id, "customerEmail": customer_email }).to_string(),
        );

        let gateway_request = GatewayPaymentRequest {
            order_id: order_id.clone(),
            transaction_ref: transaction_ref.clone(),
            amount,
            description,
            extra_data,
        };

        let payment = gateway.create_payment(&gateway_request).await.map_err(|e| {
            warn!(order_id = %order_id, %transaction_ref, error = %e, "gateway did not open a payment");
            e
        })?;

        // 4. 渠道返回支付地址后才落库
        let transaction = PaymentTransaction::new_pending(
            &order_id,
            method,
            amount,
            transaction_ref,
            Some(payment.pay_url.clone()),
        );
        if let Err(e) = self.transactions.insert(&transaction).await {
            error!(
                order_id = %order_id,
                transaction_ref = %transaction.transaction_ref,
                error = %e,
                "provider accepted the payment but the transaction could not be stored"
            );
            return Err(e);
        }
        self.hold_stock_for(&transaction).await?;

        info!(
            order_id = %order_id,
            payment_id = %transaction.payment_id,
            transaction_ref = %transaction.transaction_ref,
            method = %method,
            amount,
            "payment attempt created"
        );

        Ok(CreatePaymentResponse {
            success: true,
            payment_id: transaction.payment_id,
            pay_url: payment.pay_url,
            deeplink: payment.deeplink,
            qr_code_url: payment.qr_code_url,
            transaction_ref: transaction.transaction_ref,
        })
    }

    async fn prepare_order(&self, order_id: &str, amount: i64, request: &CreatePaymentRequest) -> Result<(), PaymentError> {
        match self.orders.find_status(order_id).await? {
            Some(OrderStatus::Paid) => {
                warn!(order_id, "payment attempt refused, order is already paid");
                return Err(PaymentError::OrderAlreadyPaid(order_id.to_string()));
            }
            Some(_) => {
                if self.orders.reserve_stock(order_id).await? {
                    info!(order_id, "released stock reserved again for a new attempt");
                }
                let pending = self.transactions.count_pending_for_order(order_id).await?;
                if pending > 0 {
                    warn!(order_id, pending, "order already has a pending payment attempt");
                }
                return Ok(());
            }
            None => {}
        }

        match &request.order_data {
            Some(data) => {
                let new_order = NewOrder::from_order_data(order_id, amount, request.customer_email.as_deref(), data)?;
                self.orders.create_with_items(&new_order).await?;
                info!(order_id, items = new_order.items.len(), "order created with stock reserved");
            }
            None => {
                warn!(order_id, "order not found and no orderData supplied, continuing without an order record");
            }
        }
        Ok(())
    }

    /// Settles from the browser redirect and returns the deep link to send
    /// the payer to.
    pub async fn handle_redirect(&self, params: HashMap<String, String>) -> Result<String, PaymentError> {
        let notice = SettlementNotice::from_redirect(params);
        let outcome = self.settle(notice, InvoicePolicy::Send).await?;
        Ok(self.result_redirect(&outcome.transaction))
    }

    pub async fn handle_ipn(&self, body: Map<String, Value>) -> Result<SettlementOutcome, PaymentError> {
        let notice = SettlementNotice::from_ipn(body);
        self.settle(notice, InvoicePolicy::Skip).await
    }

    async fn settle(&self, notice: SettlementNotice, invoice: InvoicePolicy) -> Result<SettlementOutcome, PaymentError> {
        let gateway = self.gateways.get(PaymentMethod::Momo)?;

        if let Err(e) = gateway.verify_settlement(&notice) {
            if matches!(e, PaymentError::SignatureMismatch) {
                warn!(
                    target: "security",
                    transaction_ref = notice.transaction_ref().unwrap_or_default(),
                    channel = ?notice.channel(),
                    "settlement signature mismatch, notice rejected"
                );
            }
            return Err(e);
        }

        let transaction_ref = notice
            .transaction_ref()
            .ok_or_else(|| PaymentError::Validation("Thiếu orderId".to_string()))?;
        let stored = self
            .transactions
            .find_by_ref(transaction_ref)
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound(transaction_ref.to_string()))?;

        let mut target = notice.status();
        if target == TransactionStatus::Success && notice.amount() != Some(stored.amount) {
            warn!(
                transaction_ref,
                expected = stored.amount,
                received = ?notice.amount(),
                "settled amount differs from the requested amount, settling as failed"
            );
            target = TransactionStatus::Failed;
        }

        self.apply_settlement(stored, target, notice.provider_transaction_id(), invoice).await
    }

    async fn apply_settlement(
        &self,
        stored: PaymentTransaction,
        target: TransactionStatus,
        provider_transaction_id: Option<String>,
        invoice: InvoicePolicy,
    ) -> Result<SettlementOutcome, PaymentError> {
        if stored.status.is_terminal() {
            return self.acknowledge_replay(stored, target, invoice).await;
        }

        let mut settled = stored.clone();
        settled.settle(target, provider_transaction_id)?;

        if !self.transactions.transition(&settled, TransactionStatus::Pending).await? {
            // 并发回调已先一步结算
            let current = self
                .transactions
                .find_by_ref(&stored.transaction_ref)
                .await?
                .ok_or_else(|| PaymentError::TransactionNotFound(stored.transaction_ref.clone()))?;
            return self.acknowledge_replay(current, target, invoice).await;
        }

        info!(
            transaction_ref = %settled.transaction_ref,
            order_id = %settled.order_id,
            status = %settled.status,
            "payment settled"
        );

        match settled.status {
            TransactionStatus::Success => self.complete_paid_order(&settled, invoice).await?,
            _ => self.release_if_abandoned(&settled.order_id).await?,
        }

        Ok(SettlementOutcome { transaction: settled, applied: true })
    }

    async fn acknowledge_replay(
        &self,
        current: PaymentTransaction,
        target: TransactionStatus,
        invoice: InvoicePolicy,
    ) -> Result<SettlementOutcome, PaymentError> {
        if current.status == target {
            debug!(transaction_ref = %current.transaction_ref, status = %current.status, "settlement replay acknowledged");
            if current.status == TransactionStatus::Success {
                // 两个操作都是幂等的，补齐上次可能中断的步骤
                self.complete_paid_order(&current, invoice).await?;
            }
        } else {
            warn!(
                transaction_ref = %current.transaction_ref,
                stored = %current.status,
                claimed = %target,
                "conflicting settlement for a terminal transaction ignored"
            );
        }

        Ok(SettlementOutcome { transaction: current, applied: false })
    }

    async fn complete_paid_order(&self, transaction: &PaymentTransaction, invoice: InvoicePolicy) -> Result<(), PaymentError> {
        if self.orders.mark_paid(&transaction.order_id).await? {
            info!(order_id = %transaction.order_id, "order marked paid");
        }
        if invoice == InvoicePolicy::Send {
            self.send_invoice(transaction).await;
        }
        Ok(())
    }

    // 邮件发送失败只记录日志
    async fn send_invoice(&self, transaction: &PaymentTransaction) {
        let order_id = transaction.order_id.as_str();

        match self.orders.claim_invoice(order_id).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!(order_id, error = %e, "could not claim invoice dispatch");
                return;
            }
        }

        let order = match self.orders.find_snapshot(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return,
            Err(e) => {
                warn!(order_id, error = %e, "could not load order for invoice");
                return;
            }
        };

        let Some(recipient) = order.customer_email.clone().filter(|e| !e.trim().is_empty()) else {
            info!(order_id, "order has no customer email, invoice skipped");
            return;
        };

        let payment = PaymentSnapshot::from(transaction);
        if let Err(e) = self.notifier.send_invoice_email(&order, &payment, &recipient).await {
            error!(order_id, error = %e, "invoice email failed");
        }
    }

    /// Re-takes stock for a freshly stored attempt. An attempt that failed
    /// while this one was at the provider may have released it.
    async fn hold_stock_for(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError> {
        let order_id = transaction.order_id.as_str();

        match self.orders.reserve_stock(order_id).await {
            Ok(true) => {
                info!(order_id, transaction_ref = %transaction.transaction_ref, "stock reserved again for the new attempt");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                error!(
                    order_id,
                    transaction_ref = %transaction.transaction_ref,
                    error = %e,
                    "stock is gone for the new attempt, cancelling it"
                );
                let mut cancelled = transaction.clone();
                cancelled.cancel()?;
                self.transactions.transition(&cancelled, TransactionStatus::Pending).await?;
                Err(e)
            }
        }
    }

    async fn release_if_abandoned(&self, order_id: &str) -> Result<(), PaymentError> {
        let pending = self.transactions.count_pending_for_order(order_id).await?;
        if pending > 0 {
            debug!(order_id, pending, "another attempt is still pending, stock kept");
            return Ok(());
        }
        if !self.orders.release_stock(order_id).await? {
            return Ok(());
        }
        info!(order_id, "reserved stock released");

        // 释放期间可能有新尝试入库
        if self.transactions.count_pending_for_order(order_id).await? > 0 && self.orders.reserve_stock(order_id).await? {
            info!(order_id, "stock reserved again for an attempt stored during release");
        }
        Ok(())
    }

    fn deeplink_with(&self, pairs: &[(&str, &str)]) -> String {
        match Url::parse(&self.options.result_deeplink) {
            Ok(mut url) => {
                url.query_pairs_mut().extend_pairs(pairs);
                url.to_string()
            }
            Err(e) => {
                warn!(deeplink = %self.options.result_deeplink, error = %e, "result deep link is not a valid URL");
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                format!("{}?{}", self.options.result_deeplink, query)
            }
        }
    }

    fn result_redirect(&self, transaction: &PaymentTransaction) -> String {
        let status = if transaction.status == TransactionStatus::Success { "success" } else { "failed" };
        self.deeplink_with(&[
            ("status", status),
            ("orderId", transaction.order_id.as_str()),
            ("transId", transaction.transaction_id.as_deref().unwrap_or_default()),
        ])
    }

    /// Deep link for a redirect that could not be processed.
    pub fn failure_redirect(&self) -> String {
        self.deeplink_with(&[("status", "failed")])
    }

    pub async fn check_status(&self, request: CheckStatusRequest) -> Result<Value, PaymentError> {
        let (order_id, request_id) = request.validate()?;
        let gateway = self.gateways.get(PaymentMethod::Momo)?;
        gateway.query_status(&order_id, &request_id).await
    }

    pub fn momo_config_status(&self) -> MomoConfigStatus {
        self.options.momo_status
    }

    pub async fn find_transaction(&self, payment_id: &str) -> Result<PaymentTransaction, PaymentError> {
        self.transactions
            .find_by_payment_id(payment_id)
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound(payment_id.to_string()))
    }

    /// Marks a pending attempt paid, e.g. after a bank transfer was seen on
    /// the statement.
    pub async fn confirm_transaction(&self, payment_id: &str) -> Result<PaymentTransaction, PaymentError> {
        let stored = self.find_transaction(payment_id).await?;

        let mut settled = stored.clone();
        settled.settle(TransactionStatus::Success, None)?;
        self.write_transition(&settled, "confirm").await?;

        info!(payment_id, order_id = %settled.order_id, "payment confirmed manually");
        self.complete_paid_order(&settled, InvoicePolicy::Send).await?;
        Ok(settled)
    }

    pub async fn cancel_transaction(&self, payment_id: &str) -> Result<PaymentTransaction, PaymentError> {
        let stored = self.find_transaction(payment_id).await?;

        let mut cancelled = stored.clone();
        cancelled.cancel()?;
        self.write_transition(&cancelled, "cancel").await?;

        info!(payment_id, order_id = %cancelled.order_id, "payment cancelled");
        self.release_if_abandoned(&cancelled.order_id).await?;
        Ok(cancelled)
    }

    async fn write_transition(&self, transaction: &PaymentTransaction, event: &str) -> Result<(), PaymentError> {
        if self.transactions.transition(transaction, TransactionStatus::Pending).await? {
            return Ok(());
        }

        let current = self
            .transactions
            .find_by_ref(&transaction.transaction_ref)
            .await?
            .map(|t| t.status)
            .unwrap_or(TransactionStatus::Pending);
        Err(PaymentError::InvalidStateTransition {
            from: current,
            event: event.to_string(),
        })
    }
}
