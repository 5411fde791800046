//! Conversions between engine values and the JSON bodies of the API.

use api_types::{
    Currency as CurrencyView,
    group::{GroupCategory as CategoryView, GroupView},
    member::MemberView,
};
use split_engine::{Currency, Group, GroupCategory, Member};

pub fn currency_view(currency: Currency) -> CurrencyView {
    match currency {
        Currency::Eur => CurrencyView::Eur,
        Currency::Usd => CurrencyView::Usd,
        Currency::Gbp => CurrencyView::Gbp,
        Currency::Sar => CurrencyView::Sar,
        Currency::Aed => CurrencyView::Aed,
        Currency::Egp => CurrencyView::Egp,
    }
}

pub fn currency_from_view(currency: CurrencyView) -> Currency {
    match currency {
        CurrencyView::Eur => Currency::Eur,
        CurrencyView::Usd => Currency::Usd,
        CurrencyView::Gbp => Currency::Gbp,
        CurrencyView::Sar => Currency::Sar,
        CurrencyView::Aed => Currency::Aed,
        CurrencyView::Egp => Currency::Egp,
    }
}

pub fn category_view(category: GroupCategory) -> CategoryView {
    match category {
        GroupCategory::Trip => CategoryView::Trip,
        GroupCategory::Home => CategoryView::Home,
        GroupCategory::Couple => CategoryView::Couple,
        GroupCategory::Friends => CategoryView::Friends,
        GroupCategory::Other => CategoryView::Other,
    }
}

pub fn category_from_view(category: CategoryView) -> GroupCategory {
    match category {
        CategoryView::Trip => GroupCategory::Trip,
        CategoryView::Home => GroupCategory::Home,
        CategoryView::Couple => GroupCategory::Couple,
        CategoryView::Friends => GroupCategory::Friends,
        CategoryView::Other => GroupCategory::Other,
    }
}

/// Group as seen by `user_id`.
pub fn group_view(group: Group, user_id: &str) -> GroupView {
    GroupView {
        is_admin: group.is_admin(user_id),
        id: group.id,
        name: group.name,
        description: group.description,
        category: category_view(group.category),
        currency: currency_view(group.currency),
        invite_code: group.invite_code,
        is_settled: group.is_settled,
        is_active: group.is_active,
        created_at: group.created_at,
    }
}

pub fn member_view(member: Member) -> MemberView {
    MemberView {
        id: member.id,
        linked: member.link.is_linked(),
        name: member.name,
        email: member.email,
        is_creator: member.is_creator,
        joined_at: member.joined_at,
        left_at: member.left_at,
    }
}
