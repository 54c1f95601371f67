//! Read-only kinds
//!
//! These are never reconciled; `azrm facts` reads them by name or lists a
//! resource group, optionally filtered by tags.

use super::ResourceKind;

/// A kind known only for fact queries.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyKind {
    pub name: &'static str,
    pub arm_type: &'static str,
    pub api_version: &'static str,
    pub description: &'static str,
    pub output_key: &'static str,
}

impl ResourceKind for ReadOnlyKind {
    fn name(&self) -> &'static str {
        self.name
    }

    fn arm_type(&self) -> &'static str {
        self.arm_type
    }

    fn api_version(&self) -> &'static str {
        self.api_version
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn output_key(&self) -> &'static str {
        self.output_key
    }

    fn needs_parent(&self) -> bool {
        self.arm_type.matches('/').count() == 2
    }
}

pub static READ_ONLY: [ReadOnlyKind; 6] = [
    ReadOnlyKind {
        name: "sql_database",
        arm_type: "Microsoft.Sql/servers/databases",
        api_version: "2014-04-01",
        description: "SQL databases on a logical server",
        output_key: "azure_sqldatabases",
    },
    ReadOnlyKind {
        name: "mysql_database",
        arm_type: "Microsoft.DBforMySQL/servers/databases",
        api_version: "2017-12-01",
        description: "Databases on a MySQL server",
        output_key: "azure_mysqldatabases",
    },
    ReadOnlyKind {
        name: "key_vault",
        arm_type: "Microsoft.KeyVault/vaults",
        api_version: "2018-02-14",
        description: "Key vaults",
        output_key: "azure_keyvaults",
    },
    ReadOnlyKind {
        name: "load_balancer",
        arm_type: "Microsoft.Network/loadBalancers",
        api_version: "2018-04-01",
        description: "Load balancers",
        output_key: "azure_loadbalancers",
    },
    ReadOnlyKind {
        name: "container_instance",
        arm_type: "Microsoft.ContainerInstance/containerGroups",
        api_version: "2018-06-01",
        description: "Container instance groups",
        output_key: "azure_containerinstances",
    },
    ReadOnlyKind {
        name: "route_table",
        arm_type: "Microsoft.Network/routeTables",
        api_version: "2018-04-01",
        description: "Route tables",
        output_key: "azure_routetables",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_kinds_have_no_rules() {
        assert!(READ_ONLY.iter().all(|kind| kind.rules().is_none()));
    }

    #[test]
    fn test_database_kinds_are_nested() {
        let nested: Vec<_> = READ_ONLY
            .iter()
            .filter(|k| k.needs_parent())
            .map(|k| k.name)
            .collect();
        assert_eq!(nested, vec!["sql_database", "mysql_database"]);
    }
}
