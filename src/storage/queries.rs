//! Backend-neutral statement builders.
//!
//! Each backend renders these with its own query builder and executes them on
//! its own pool or transaction; only the statement shapes are shared.

use chrono::{SecondsFormat, Utc};
use sea_query::{
    Expr, InsertStatement, OnConflict, Order as Direction, Query, SelectStatement,
    UpdateStatement,
};

use crate::ledger::{Amount, OrderStatus, Verdict, UNSETTLED};
use crate::storage::schema::{Orders, Users, Withdrawals};

/// Current time as fixed-width RFC 3339 so text columns sort chronologically.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn insert_user(login: &str, password_hash: &str) -> InsertStatement {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Login, Users::PasswordHash, Users::CreatedAt])
        .values_panic([login.into(), password_hash.into(), now().into()])
        .to_owned()
}

pub(crate) fn select_password_hash(login: &str) -> SelectStatement {
    Query::select()
        .column(Users::PasswordHash)
        .from(Users::Table)
        .and_where(Expr::col(Users::Login).eq(login))
        .to_owned()
}

pub(crate) fn select_order_owner(number: &str) -> SelectStatement {
    Query::select()
        .column(Orders::Login)
        .from(Orders::Table)
        .and_where(Expr::col(Orders::Number).eq(number))
        .to_owned()
}

pub(crate) fn insert_order(number: &str, login: &str) -> InsertStatement {
    Query::insert()
        .into_table(Orders::Table)
        .columns([Orders::Number, Orders::Login, Orders::Status, Orders::UploadedAt])
        .values_panic([
            number.into(),
            login.into(),
            OrderStatus::New.as_str().into(),
            now().into(),
        ])
        .on_conflict(OnConflict::column(Orders::Number).do_nothing().to_owned())
        .to_owned()
}

fn order_columns(select: &mut SelectStatement) -> &mut SelectStatement {
    select
        .columns([Orders::Number, Orders::Status, Orders::Accrual, Orders::UploadedAt])
        .from(Orders::Table)
}

pub(crate) fn select_orders(login: &str) -> SelectStatement {
    order_columns(&mut Query::select())
        .and_where(Expr::col(Orders::Login).eq(login))
        .order_by(Orders::UploadedAt, Direction::Desc)
        .order_by(Orders::Id, Direction::Desc)
        .to_owned()
}

pub(crate) fn select_unsettled() -> SelectStatement {
    order_columns(&mut Query::select())
        .and_where(Expr::col(Orders::Status).is_in(UNSETTLED.map(OrderStatus::as_str)))
        .order_by(Orders::UploadedAt, Direction::Asc)
        .order_by(Orders::Id, Direction::Asc)
        .to_owned()
}

/// Conditional verdict update returning the owner's login.
///
/// Matches only while the order is in a status that may legally move to the
/// verdict's status, so settled orders are never touched and a re-applied
/// verdict cannot credit twice.
pub(crate) fn update_verdict(verdict: &Verdict) -> UpdateStatement {
    let accrual: Option<i64> = verdict.accrual.map(Amount::hundredths);
    let predecessors: Vec<&'static str> = verdict
        .status
        .predecessors()
        .into_iter()
        .map(OrderStatus::as_str)
        .collect();

    Query::update()
        .table(Orders::Table)
        .values([
            (Orders::Status, verdict.status.as_str().into()),
            (Orders::Accrual, accrual.into()),
        ])
        .and_where(Expr::col(Orders::Number).eq(verdict.number.as_str()))
        .and_where(Expr::col(Orders::Status).is_in(predecessors))
        .returning_col(Orders::Login)
        .to_owned()
}

pub(crate) fn credit_user(login: &str, amount: Amount) -> UpdateStatement {
    Query::update()
        .table(Users::Table)
        .value(
            Users::CurrentBalance,
            Expr::col(Users::CurrentBalance).add(amount.hundredths()),
        )
        .and_where(Expr::col(Users::Login).eq(login))
        .to_owned()
}

pub(crate) fn select_balance(login: &str) -> SelectStatement {
    Query::select()
        .columns([Users::CurrentBalance, Users::Withdrawn])
        .from(Users::Table)
        .and_where(Expr::col(Users::Login).eq(login))
        .to_owned()
}

/// Debit that only matches when the balance covers `sum`.
pub(crate) fn debit_user(login: &str, sum: Amount) -> UpdateStatement {
    Query::update()
        .table(Users::Table)
        .value(
            Users::CurrentBalance,
            Expr::col(Users::CurrentBalance).sub(sum.hundredths()),
        )
        .value(Users::Withdrawn, Expr::col(Users::Withdrawn).add(sum.hundredths()))
        .and_where(Expr::col(Users::Login).eq(login))
        .and_where(Expr::col(Users::CurrentBalance).gte(sum.hundredths()))
        .to_owned()
}

pub(crate) fn insert_withdrawal(login: &str, order: &str, sum: Amount) -> InsertStatement {
    Query::insert()
        .into_table(Withdrawals::Table)
        .columns([
            Withdrawals::Login,
            Withdrawals::OrderNumber,
            Withdrawals::Sum,
            Withdrawals::ProcessedAt,
        ])
        .values_panic([login.into(), order.into(), sum.hundredths().into(), now().into()])
        .to_owned()
}

pub(crate) fn select_withdrawals(login: &str) -> SelectStatement {
    Query::select()
        .columns([Withdrawals::OrderNumber, Withdrawals::Sum, Withdrawals::ProcessedAt])
        .from(Withdrawals::Table)
        .and_where(Expr::col(Withdrawals::Login).eq(login))
        .order_by(Withdrawals::ProcessedAt, Direction::Desc)
        .order_by(Withdrawals::Id, Direction::Desc)
        .to_owned()
}
