//! 树木查询过滤条件（TreeFilter）
//!
//! ORM 无法表达的合成过滤字段在此翻译为 SQL 片段：
//! - `tagId`：连接 `tree_tag`，显式 `null` 表示“未打标签”；
//! - `organizationId`：组织及其全部下级组织名下的种植者/种植组织。
//!
//! 取值一律以 `$n` 占位符与 `FilterValue` 分离返回，不拼接进 SQL 文本。
//!
use crate::error::{DomainError, DomainResult};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 标签过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFilter {
    /// 带有指定标签
    Tagged(i64),
    /// 未打任何标签
    Untagged,
}

/// 可排序列（白名单）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TreeSortField {
    #[default]
    Id,
    TimeCreated,
    TimeUpdated,
}

impl TreeSortField {
    pub fn column(&self) -> &'static str {
        match self {
            TreeSortField::Id => "trees.id",
            TreeSortField::TimeCreated => "trees.time_created",
            TreeSortField::TimeUpdated => "trees.time_updated",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// 绑定参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterValue {
    Int(i64),
    Bool(bool),
}

/// 翻译结果：SQL 文本与按占位符顺序排列的绑定参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSql {
    pub sql: String,
    pub binds: Vec<FilterValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
pub struct TreeFilter {
    pub tag: Option<TagFilter>,
    pub organization_id: Option<i64>,
    pub active: Option<bool>,
    pub approved: Option<bool>,
    pub planter_id: Option<i64>,
    pub species_id: Option<i64>,
    #[builder(default)]
    #[serde(default)]
    pub order_by: TreeSortField,
    #[builder(default)]
    #[serde(default)]
    pub direction: SortDirection,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Default)]
struct Clauses {
    join: Option<&'static str>,
    conditions: Vec<String>,
    binds: Vec<FilterValue>,
}

impl Clauses {
    fn bind(&mut self, value: FilterValue) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    fn eq(&mut self, column: &str, value: FilterValue) {
        let placeholder = self.bind(value);
        self.conditions.push(format!("{column} = {placeholder}"));
    }

    fn from_where(&self) -> String {
        let mut sql = String::from(" FROM trees");
        if let Some(join) = self.join {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        sql
    }
}

impl TreeFilter {
    /// 解析请求中的 `where` 对象（camelCase 键）。
    ///
    /// `tagId: null` 与缺省含义不同：前者表示筛选未打标签的记录。
    pub fn from_where(value: &Value) -> DomainResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(DomainError::InvalidValue {
                reason: "where clause must be an object".to_string(),
            });
        };

        let mut filter = TreeFilter::default();
        for (key, value) in object {
            match key.as_str() {
                "tagId" => {
                    filter.tag = Some(match value {
                        Value::Null => TagFilter::Untagged,
                        other => TagFilter::Tagged(int_field(key, other)?),
                    })
                }
                "organizationId" => filter.organization_id = Some(int_field(key, value)?),
                "planterId" => filter.planter_id = Some(int_field(key, value)?),
                "speciesId" => filter.species_id = Some(int_field(key, value)?),
                "active" => filter.active = Some(bool_field(key, value)?),
                "approved" => filter.approved = Some(bool_field(key, value)?),
                other => {
                    return Err(DomainError::InvalidValue {
                        reason: format!("unsupported filter field: {other}"),
                    });
                }
            }
        }

        Ok(filter)
    }

    fn clauses(&self) -> Clauses {
        let mut c = Clauses::default();

        match self.tag {
            Some(TagFilter::Tagged(tag_id)) => {
                c.join = Some("JOIN tree_tag ON tree_tag.tree_id = trees.id");
                c.eq("tree_tag.tag_id", FilterValue::Int(tag_id));
            }
            Some(TagFilter::Untagged) => {
                c.join = Some("LEFT JOIN tree_tag ON tree_tag.tree_id = trees.id");
                c.conditions.push("tree_tag.tag_id IS NULL".to_string());
            }
            None => {}
        }

        if let Some(organization_id) = self.organization_id {
            let p = c.bind(FilterValue::Int(organization_id));
            c.conditions.push(format!(
                "(trees.planter_id IN (SELECT id FROM planter WHERE organization_id IN \
                 (SELECT entity_id FROM getEntityRelationshipChildren({p}))) \
                 OR trees.planting_organization_id IN \
                 (SELECT entity_id FROM getEntityRelationshipChildren({p})))"
            ));
        }

        if let Some(active) = self.active {
            c.eq("trees.active", FilterValue::Bool(active));
        }
        if let Some(approved) = self.approved {
            c.eq("trees.approved", FilterValue::Bool(approved));
        }
        if let Some(planter_id) = self.planter_id {
            c.eq("trees.planter_id", FilterValue::Int(planter_id));
        }
        if let Some(species_id) = self.species_id {
            c.eq("trees.species_id", FilterValue::Int(species_id));
        }

        c
    }

    /// 列表查询 SQL（含排序与分页）
    pub fn select_sql(&self) -> FilterSql {
        let mut c = self.clauses();
        let mut sql = format!("SELECT trees.*{}", c.from_where());

        sql.push_str(&format!(
            " ORDER BY {} {}",
            self.order_by.column(),
            self.direction.as_sql()
        ));
        if let Some(limit) = self.limit {
            let p = c.bind(FilterValue::Int(i64::from(limit)));
            sql.push_str(&format!(" LIMIT {p}"));
        }
        if let Some(offset) = self.offset {
            let p = c.bind(FilterValue::Int(i64::from(offset)));
            sql.push_str(&format!(" OFFSET {p}"));
        }

        FilterSql {
            sql,
            binds: c.binds,
        }
    }

    /// 计数 SQL（忽略排序与分页）
    pub fn count_sql(&self) -> FilterSql {
        let c = self.clauses();
        let sql = format!("SELECT COUNT(*){}", c.from_where());

        FilterSql {
            sql,
            binds: c.binds,
        }
    }
}

fn int_field(key: &str, value: &Value) -> DomainResult<i64> {
    value.as_i64().ok_or_else(|| DomainError::InvalidValue {
        reason: format!("{key} must be an integer"),
    })
}

fn bool_field(key: &str, value: &Value) -> DomainResult<bool> {
    value.as_bool().ok_or_else(|| DomainError::InvalidValue {
        reason: format!("{key} must be a boolean"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_selects_everything_in_id_order() {
        let out = TreeFilter::default().select_sql();
        assert_eq!(out.sql, "SELECT trees.* FROM trees ORDER BY trees.id ASC");
        assert!(out.binds.is_empty());
    }

    #[test]
    fn tag_id_joins_tree_tag() {
        let filter = TreeFilter::builder()
            .tag(TagFilter::Tagged(5))
            .active(true)
            .build();
        let out = filter.count_sql();
        assert_eq!(
            out.sql,
            "SELECT COUNT(*) FROM trees JOIN tree_tag ON tree_tag.tree_id = trees.id \
             WHERE tree_tag.tag_id = $1 AND trees.active = $2"
        );
        assert_eq!(out.binds, vec![FilterValue::Int(5), FilterValue::Bool(true)]);
    }

    #[test]
    fn untagged_uses_left_join_without_bind() {
        let filter = TreeFilter::builder().tag(TagFilter::Untagged).build();
        let out = filter.count_sql();
        assert_eq!(
            out.sql,
            "SELECT COUNT(*) FROM trees LEFT JOIN tree_tag ON tree_tag.tree_id = trees.id \
             WHERE tree_tag.tag_id IS NULL"
        );
        assert!(out.binds.is_empty());
    }

    #[test]
    fn organization_reuses_one_placeholder_for_both_branches() {
        let filter = TreeFilter::builder()
            .organization_id(8)
            .approved(false)
            .build();
        let out = filter.count_sql();
        assert_eq!(out.sql.matches("getEntityRelationshipChildren($1)").count(), 2);
        assert!(out.sql.contains("trees.planting_organization_id IN"));
        assert!(out.sql.ends_with("AND trees.approved = $2"));
        assert_eq!(out.binds, vec![FilterValue::Int(8), FilterValue::Bool(false)]);
    }

    #[test]
    fn paging_binds_follow_filter_binds() {
        let filter = TreeFilter::builder()
            .planter_id(2)
            .order_by(TreeSortField::TimeCreated)
            .direction(SortDirection::Desc)
            .limit(10)
            .offset(20)
            .build();
        let out = filter.select_sql();
        assert_eq!(
            out.sql,
            "SELECT trees.* FROM trees WHERE trees.planter_id = $1 \
             ORDER BY trees.time_created DESC LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            out.binds,
            vec![FilterValue::Int(2), FilterValue::Int(10), FilterValue::Int(20)]
        );

        // 计数不受分页影响
        assert_eq!(filter.count_sql().binds, vec![FilterValue::Int(2)]);
    }

    #[test]
    fn where_clause_distinguishes_null_tag_from_absent() {
        let untagged = TreeFilter::from_where(&json!({ "tagId": null })).unwrap();
        assert_eq!(untagged.tag, Some(TagFilter::Untagged));

        let tagged = TreeFilter::from_where(&json!({ "tagId": 4, "organizationId": 1 })).unwrap();
        assert_eq!(tagged.tag, Some(TagFilter::Tagged(4)));
        assert_eq!(tagged.organization_id, Some(1));

        let none = TreeFilter::from_where(&json!({ "active": true })).unwrap();
        assert_eq!(none.tag, None);
        assert_eq!(none.active, Some(true));
    }

    #[test]
    fn where_clause_rejects_unknown_and_mistyped_fields() {
        let err = TreeFilter::from_where(&json!({ "lat": 1 })).unwrap_err();
        assert!(matches!(err, DomainError::InvalidValue { .. }));

        let err = TreeFilter::from_where(&json!({ "organizationId": "x" })).unwrap_err();
        assert!(matches!(err, DomainError::InvalidValue { .. }));

        assert!(TreeFilter::from_where(&json!([1])).is_err());
    }
}
