//! SQL query constants
//!
//! Catalog queries used to build the schema dependency graph.
//! Every query skips system schemas and objects owned by extensions.

/// Tables, views, functions and procedures with their graph kind
pub const LIST_SCHEMA_OBJECTS: &str = r#"
    SELECT
        n.nspname::text AS schema_name,
        c.relname::text AS object_name,
        CASE WHEN c.relkind IN ('v', 'm') THEN 'view' ELSE 'table' END AS kind
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind IN ('r', 'p', 'v', 'm')
        AND n.nspname NOT IN ('pg_catalog', 'information_schema')
        AND n.nspname !~ '^pg_toast'
        AND NOT EXISTS (
            SELECT 1 FROM pg_catalog.pg_depend e
            WHERE e.classid = 'pg_class'::regclass AND e.objid = c.oid AND e.deptype = 'e'
        )
    UNION ALL
    SELECT
        n.nspname::text,
        p.proname::text,
        CASE WHEN p.prokind = 'p' THEN 'procedure' ELSE 'function' END
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
    WHERE p.prokind IN ('f', 'p')
        AND n.nspname NOT IN ('pg_catalog', 'information_schema')
        AND n.nspname !~ '^pg_toast'
        AND NOT EXISTS (
            SELECT 1 FROM pg_catalog.pg_depend e
            WHERE e.classid = 'pg_proc'::regclass AND e.objid = p.oid AND e.deptype = 'e'
        )
    ORDER BY 1, 2
"#;

/// Relations and routines referenced by view rewrite rules
pub const LIST_VIEW_DEPENDENCIES: &str = r#"
    SELECT DISTINCT
        vn.nspname::text || '.' || v.relname::text AS dependent,
        COALESCE(
            rn.nspname::text || '.' || r.relname::text,
            pn.nspname::text || '.' || p.proname::text
        ) AS dependency
    FROM pg_catalog.pg_depend d
    JOIN pg_catalog.pg_rewrite rw ON rw.oid = d.objid
    JOIN pg_catalog.pg_class v ON v.oid = rw.ev_class
    JOIN pg_catalog.pg_namespace vn ON vn.oid = v.relnamespace
    LEFT JOIN pg_catalog.pg_class r
        ON d.refclassid = 'pg_class'::regclass AND r.oid = d.refobjid AND r.relkind IN ('r', 'p', 'v', 'm')
    LEFT JOIN pg_catalog.pg_namespace rn ON rn.oid = r.relnamespace
    LEFT JOIN pg_catalog.pg_proc p
        ON d.refclassid = 'pg_proc'::regclass AND p.oid = d.refobjid
    LEFT JOIN pg_catalog.pg_namespace pn ON pn.oid = p.pronamespace
    WHERE d.classid = 'pg_rewrite'::regclass
        AND d.deptype = 'n'
        AND d.refobjid <> v.oid
        AND (r.oid IS NOT NULL OR p.oid IS NOT NULL)
        AND vn.nspname NOT IN ('pg_catalog', 'information_schema')
    ORDER BY 1, 2
"#;

/// Dependencies the catalog tracks for routines (SQL-standard bodies)
pub const LIST_ROUTINE_DEPENDENCIES: &str = r#"
    SELECT DISTINCT
        fs.nspname::text || '.' || f.proname::text AS dependent,
        COALESCE(
            rn.nspname::text || '.' || r.relname::text,
            pn.nspname::text || '.' || p.proname::text
        ) AS dependency
    FROM pg_catalog.pg_depend d
    JOIN pg_catalog.pg_proc f ON f.oid = d.objid
    JOIN pg_catalog.pg_namespace fs ON fs.oid = f.pronamespace
    LEFT JOIN pg_catalog.pg_class r
        ON d.refclassid = 'pg_class'::regclass AND r.oid = d.refobjid AND r.relkind IN ('r', 'p', 'v', 'm')
    LEFT JOIN pg_catalog.pg_namespace rn ON rn.oid = r.relnamespace
    LEFT JOIN pg_catalog.pg_proc p
        ON d.refclassid = 'pg_proc'::regclass AND p.oid = d.refobjid
    LEFT JOIN pg_catalog.pg_namespace pn ON pn.oid = p.pronamespace
    WHERE d.classid = 'pg_proc'::regclass
        AND d.deptype = 'n'
        AND d.refobjid <> f.oid
        AND (r.oid IS NOT NULL OR p.oid IS NOT NULL)
        AND fs.nspname NOT IN ('pg_catalog', 'information_schema')
    ORDER BY 1, 2
"#;

/// Source text of SQL and PL/pgSQL routines
pub const LIST_ROUTINE_BODIES: &str = r#"
    SELECT
        n.nspname::text || '.' || p.proname::text AS routine_name,
        p.prosrc AS body
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
    JOIN pg_catalog.pg_language l ON l.oid = p.prolang
    WHERE p.prokind IN ('f', 'p')
        AND l.lanname IN ('sql', 'plpgsql')
        AND n.nspname NOT IN ('pg_catalog', 'information_schema')
    ORDER BY n.nspname, p.proname, p.oid
"#;

/// View definition by schema and name
pub const GET_VIEW_DEFINITION: &str = r#"
    SELECT
        CASE WHEN c.relkind = 'm' THEN 'MATERIALIZED VIEW' ELSE 'VIEW' END AS kind,
        pg_catalog.pg_get_viewdef(c.oid, true) AS definition
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind IN ('v', 'm')
"#;

/// Function or procedure definition by schema and name (first overload)
pub const GET_ROUTINE_DEFINITION: &str = r#"
    SELECT pg_catalog.pg_get_functiondef(p.oid) AS definition
    FROM pg_catalog.pg_proc p
    JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
    WHERE n.nspname = $1 AND p.proname = $2 AND p.prokind IN ('f', 'p')
    ORDER BY p.oid
    LIMIT 1
"#;

/// Column list of a table, in ordinal order
pub const GET_TABLE_COLUMNS: &str = r#"
    SELECT
        c.column_name::text AS column_name,
        c.data_type::text AS data_type,
        c.is_nullable::text AS is_nullable,
        c.column_default::text AS column_default
    FROM information_schema.columns c
    WHERE c.table_schema::text = $1 AND c.table_name::text = $2
    ORDER BY c.ordinal_position
"#;

/// Quote an identifier (schema/table/column name) safely
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
