//! Database queries for the OTAP device registry.

use otap_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::{Device, NewVersionCheck};

impl Database {
    // =========================================================================
    // Device registry
    // =========================================================================

    /// Upsert a device record (the `add` command).
    ///
    /// Creates the row if the IMEI is unknown, otherwise updates custid and
    /// tid in place. The block flag is always cleared; `add` re-enables a
    /// previously blocked device by contract.
    pub async fn upsert_device(
        &self,
        imei: &str,
        custid: &str,
        tid: Option<&str>,
    ) -> Result<Device, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO devices (imei, custid, tid, block, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)
             ON CONFLICT(imei) DO UPDATE SET
               custid = excluded.custid,
               tid = excluded.tid,
               block = 0,
               updated_at = excluded.updated_at",
        )
        .bind(imei)
        .bind(custid)
        .bind(tid)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_device(imei)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Device {imei}")))
    }

    /// Look up a device by IMEI.
    pub async fn get_device(&self, imei: &str) -> Result<Option<Device>, DatabaseError> {
        let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE imei = ?")
            .bind(imei)
            .fetch_optional(self.pool())
            .await?;
        Ok(device)
    }

    /// Look up a device scoped to a customer (device-facing paths).
    pub async fn get_device_scoped(
        &self,
        imei: &str,
        custid: &str,
    ) -> Result<Option<Device>, DatabaseError> {
        let device =
            sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE imei = ? AND custid = ?")
                .bind(imei)
                .bind(custid)
                .fetch_optional(self.pool())
                .await?;
        Ok(device)
    }

    /// Record the version a device self-reported at check-in.
    pub async fn set_reported(&self, imei: &str, version: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE devices SET reported = ?, updated_at = ? WHERE imei = ?")
            .bind(version)
            .bind(unix_timestamp())
            .bind(imei)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Assign a delivery target. Returns `false` when the IMEI is unknown.
    ///
    /// Single-statement update: concurrent `deliver` calls for the same
    /// IMEI resolve last-write-wins per row, never lost.
    pub async fn set_deliver(
        &self,
        imei: &str,
        version: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE devices SET deliver = ?, updated_at = ? WHERE imei = ?")
            .bind(version)
            .bind(unix_timestamp())
            .bind(imei)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the block flag for one device.
    pub async fn set_block(&self, imei: &str, block: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE devices SET block = ?, updated_at = ? WHERE imei = ?")
            .bind(i64::from(block))
            .bind(unix_timestamp())
            .bind(imei)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the block flag for every device (single bulk update).
    pub async fn set_block_all(&self, block: bool) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE devices SET block = ?, updated_at = ?")
            .bind(i64::from(block))
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Replace the stored settings string for a device.
    pub async fn set_settings(&self, imei: &str, settings: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE devices SET settings = ?, updated_at = ? WHERE imei = ?")
            .bind(settings)
            .bind(unix_timestamp())
            .bind(imei)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Snapshot of devices, optionally filtered to one IMEI, ordered by tid.
    pub async fn list_devices(
        &self,
        imei: Option<&str>,
    ) -> Result<Vec<Device>, DatabaseError> {
        let devices = match imei {
            Some(imei) => {
                sqlx::query_as::<_, Device>(
                    "SELECT * FROM devices WHERE imei = ? ORDER BY tid ASC",
                )
                .bind(imei)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, Device>("SELECT * FROM devices ORDER BY tid ASC")
                    .fetch_all(self.pool())
                    .await?
            }
        };
        Ok(devices)
    }

    /// Devices carrying the given terminal label, ordered by IMEI.
    pub async fn find_by_tid(&self, tid: &str) -> Result<Vec<Device>, DatabaseError> {
        let devices =
            sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE tid = ? ORDER BY imei ASC")
                .bind(tid)
                .fetch_all(self.pool())
                .await?;
        Ok(devices)
    }

    /// Number of devices whose delivery target is exactly this version.
    pub async fn count_targeting(&self, version: &str) -> Result<i64, DatabaseError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM devices WHERE deliver = ?")
                .bind(version)
                .fetch_one(self.pool())
                .await?;
        Ok(count.0)
    }

    /// Number of devices on the live `*` selector.
    pub async fn count_wildcard(&self) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices WHERE deliver = '*'")
            .fetch_one(self.pool())
            .await?;
        Ok(count.0)
    }

    // =========================================================================
    // Check-in audit log (append-only)
    // =========================================================================

    /// Append one check-in audit record.
    pub async fn insert_versioncheck(
        &self,
        check: &NewVersionCheck,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO versionchecks
               (imei, custid, tid, reported, upgrade_offered, offered_version, tstamp)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&check.imei)
        .bind(&check.custid)
        .bind(&check.tid)
        .bind(&check.reported)
        .bind(i64::from(check.upgrade_offered))
        .bind(&check.offered_version)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Audit records for one device, newest first (telemetry queries).
    pub async fn versionchecks_for(
        &self,
        imei: &str,
    ) -> Result<Vec<super::models::VersionCheck>, DatabaseError> {
        let checks = sqlx::query_as::<_, super::models::VersionCheck>(
            "SELECT * FROM versionchecks WHERE imei = ? ORDER BY tstamp DESC, id DESC",
        )
        .bind(imei)
        .fetch_all(self.pool())
        .await?;
        Ok(checks)
    }

    // =========================================================================
    // Delivery result log (append-only)
    // =========================================================================

    /// Append one reported upgrade outcome.
    pub async fn insert_delivery_result(
        &self,
        tid: &str,
        result: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO deliveryresults (tid, result, tstamp) VALUES (?, ?, ?)")
            .bind(tid)
            .bind(result)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Reported outcomes for one terminal label, newest first.
    pub async fn delivery_results_for(
        &self,
        tid: &str,
    ) -> Result<Vec<super::models::DeliveryResult>, DatabaseError> {
        let results = sqlx::query_as::<_, super::models::DeliveryResult>(
            "SELECT * FROM deliveryresults WHERE tid = ? ORDER BY tstamp DESC, id DESC",
        )
        .bind(tid)
        .fetch_all(self.pool())
        .await?;
        Ok(results)
    }
}
