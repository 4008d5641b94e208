// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Catalog queries for metadata extraction. Each engine has its own submodule
// with queries adapted to its system catalogs. All of them are read-only.

pub mod postgres {
    pub const LIST_SCHEMAS: &str = r#"
        SELECT nspname::text AS schema_name
        FROM pg_namespace
        WHERE nspname NOT IN ('pg_catalog', 'information_schema')
        AND nspname NOT LIKE 'pg_toast%'
        AND nspname NOT LIKE 'pg_temp_%'
        ORDER BY nspname
        "#;

    pub const LIST_TABLES: &str = r#"
        SELECT
            t.table_name::text AS table_name,
            t.table_type::text AS table_type,
            obj_description((quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass) AS comment
        FROM information_schema.tables t
        WHERE t.table_schema = $1
        AND t.table_type IN ('BASE TABLE', 'VIEW')
        ORDER BY t.table_name
        "#;

    pub const TABLE_SIZES: &str = r#"
        SELECT
            c.relname::text AS table_name,
            pg_relation_size(c.oid) AS data_size,
            pg_indexes_size(c.oid) AS index_size
        FROM pg_class c
        JOIN pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
        AND c.relkind IN ('r', 'p', 'm')
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name::text AS column_name,
            c.ordinal_position::int4 AS ordinal_position,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            CASE WHEN pk.column_name IS NOT NULL THEN true ELSE false END AS is_primary_key,
            col_description(t.oid, a.attnum) AS column_comment
        FROM information_schema.columns c
        JOIN pg_class t ON t.relname = c.table_name
        JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = c.table_schema
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
        LEFT JOIN (
            SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_name = $1
            AND tc.table_schema = $2
            AND tc.constraint_type = 'PRIMARY KEY'
        ) pk ON c.column_name = pk.column_name
        WHERE c.table_name = $1 AND c.table_schema = $2
        ORDER BY c.ordinal_position
        "#;

    /// One row per column pair; `unnest` keeps composite keys aligned.
    pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT
            con.conname::text AS constraint_name,
            src.attname::text AS column_name,
            ref_cls.relname::text AS foreign_table_name,
            ref.attname::text AS foreign_column_name,
            k.ord::int4 AS position
        FROM pg_constraint con
        JOIN pg_class cls ON cls.oid = con.conrelid
        JOIN pg_namespace ns ON ns.oid = cls.relnamespace
        JOIN pg_class ref_cls ON ref_cls.oid = con.confrelid
        CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(src_attnum, ref_attnum, ord)
        JOIN pg_attribute src ON src.attrelid = con.conrelid AND src.attnum = k.src_attnum
        JOIN pg_attribute ref ON ref.attrelid = con.confrelid AND ref.attnum = k.ref_attnum
        WHERE con.contype = 'f'
        AND cls.relname = $1
        AND ns.nspname = $2
        ORDER BY con.conname, k.ord
        "#;

    pub const DESCRIBE_INDEXES: &str = r#"
        SELECT
            i.relname::text AS index_name,
            array_agg(a.attname::text ORDER BY array_position(ix.indkey, a.attnum)) AS column_names,
            ix.indisunique AS is_unique,
            ix.indisprimary AS is_primary
        FROM pg_index ix
        JOIN pg_class i ON i.oid = ix.indexrelid
        JOIN pg_class t ON t.oid = ix.indrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
        WHERE t.relname = $1 AND n.nspname = $2
        GROUP BY i.relname, ix.indisunique, ix.indisprimary
        ORDER BY i.relname
        "#;
}

pub mod mysql {
    pub const LIST_SCHEMAS: &str = r#"
        SELECT CONVERT(SCHEMA_NAME USING utf8) AS SCHEMA_NAME
        FROM information_schema.SCHEMATA
        WHERE SCHEMA_NAME = COALESCE(DATABASE(), SCHEMA_NAME)
        AND SCHEMA_NAME NOT IN ('mysql', 'information_schema', 'performance_schema', 'sys')
        ORDER BY SCHEMA_NAME
        "#;

    /// `UPDATED_AT` is the later of creation and last write; InnoDB refreshes
    /// `CREATE_TIME` when a table is rebuilt by DDL.
    pub const LIST_TABLES: &str = r#"
        SELECT
            CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME,
            CONVERT(TABLE_TYPE USING utf8) AS TABLE_TYPE,
            GREATEST(CREATE_TIME, COALESCE(UPDATE_TIME, CREATE_TIME)) AS UPDATED_AT,
            CONVERT(TABLE_COMMENT USING utf8) AS TABLE_COMMENT
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
        AND TABLE_TYPE IN ('BASE TABLE', 'VIEW')
        ORDER BY TABLE_NAME
        "#;

    pub const TABLE_SIZES: &str = r#"
        SELECT
            CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME,
            DATA_LENGTH AS DATA_SIZE,
            INDEX_LENGTH AS INDEX_SIZE
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
        AND TABLE_TYPE = 'BASE TABLE'
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            ORDINAL_POSITION,
            CONVERT(COLUMN_TYPE USING utf8) AS COLUMN_TYPE,
            CONVERT(IS_NULLABLE USING utf8) AS IS_NULLABLE,
            CONVERT(COLUMN_DEFAULT USING utf8) AS COLUMN_DEFAULT,
            CONVERT(COLUMN_KEY USING utf8) AS COLUMN_KEY,
            CONVERT(COLUMN_COMMENT USING utf8) AS COLUMN_COMMENT
        FROM information_schema.columns
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = COALESCE(?, DATABASE())
        ORDER BY ORDINAL_POSITION
        "#;

    pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT
            CONVERT(CONSTRAINT_NAME USING utf8) AS CONSTRAINT_NAME,
            CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(REFERENCED_TABLE_NAME USING utf8) AS REFERENCED_TABLE_NAME,
            CONVERT(REFERENCED_COLUMN_NAME USING utf8) AS REFERENCED_COLUMN_NAME,
            ORDINAL_POSITION
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_NAME = ?
        AND TABLE_SCHEMA = COALESCE(?, DATABASE())
        AND REFERENCED_TABLE_NAME IS NOT NULL
        ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

    pub const DESCRIBE_INDEXES: &str = r#"
        SELECT
            CONVERT(INDEX_NAME USING utf8) AS INDEX_NAME,
            CONVERT(GROUP_CONCAT(COLUMN_NAME ORDER BY SEQ_IN_INDEX) USING utf8) AS COLUMN_NAMES,
            NOT NON_UNIQUE AS IS_UNIQUE
        FROM information_schema.STATISTICS
        WHERE TABLE_NAME = ? AND TABLE_SCHEMA = COALESCE(?, DATABASE())
        GROUP BY INDEX_NAME, NON_UNIQUE
        ORDER BY INDEX_NAME
        "#;
}

pub mod sqlite {
    pub const LIST_SCHEMAS: &str = r#"
        SELECT name FROM pragma_database_list
        WHERE name <> 'temp'
        ORDER BY seq
        "#;

    pub const LIST_TABLES: &str = r#"
        SELECT name, type FROM sqlite_master
        WHERE type IN ('table', 'view')
        AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#;

    /// Requires the dbstat virtual table; `main` only.
    pub const TABLE_SIZES: &str = r#"
        SELECT
            m.tbl_name AS table_name,
            SUM(CASE WHEN m.type = 'table' THEN s.pgsize ELSE 0 END) AS data_size,
            SUM(CASE WHEN m.type = 'index' THEN s.pgsize ELSE 0 END) AS index_size
        FROM dbstat s
        JOIN sqlite_master m ON m.name = s.name
        GROUP BY m.tbl_name
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT cid, name, type, "notnull", dflt_value, pk
        FROM pragma_table_info(?1, ?2)
        ORDER BY cid
        "#;

    pub const PRIMARY_KEY_COLUMNS: &str = r#"
        SELECT name FROM pragma_table_info(?1, ?2)
        WHERE pk > 0
        ORDER BY pk
        "#;

    pub const DESCRIBE_FOREIGN_KEYS: &str = r#"
        SELECT id, seq, "table", "from", "to"
        FROM pragma_foreign_key_list(?1, ?2)
        ORDER BY id, seq
        "#;

    pub const LIST_INDEXES: &str = r#"
        SELECT name, "unique", origin
        FROM pragma_index_list(?1, ?2)
        ORDER BY name
        "#;

    pub const INDEX_COLUMNS: &str = r#"
        SELECT name FROM pragma_index_info(?1, ?2)
        ORDER BY seqno
        "#;
}
