//! The fixed preamble every generated profile starts with: the minimum a
//! POSIX shell and common CLI tooling need to run at all, independent of any
//! user-supplied read/write/network rules.

pub(crate) const BASE_POLICY: &str = r#"(version 1)
(deny default)

(allow process-fork)
(allow process-exec)
(allow process-info-pidinfo)
(allow process-info-setcontrol (target self))
(allow signal (target self))
(allow ipc-posix-shm)
(allow ipc-posix-sem)
(allow file-read-metadata)
(allow file-ioctl)

(allow mach-lookup
    (global-name "com.apple.system.opendirectoryd.libinfo")
    (global-name "com.apple.system.logger")
    (global-name "com.apple.diagnosticd"))

(allow sysctl-read
    (sysctl-name "kern.proc.all")
    (sysctl-name "kern.ostype")
    (sysctl-name "kern.osrelease")
    (sysctl-name "kern.osvariant_status")
    (sysctl-name "kern.hostname")
    (sysctl-name "kern.argmax")
    (sysctl-name "hw.ncpu")
    (sysctl-name "hw.activecpu")
    (sysctl-name "hw.byteorder")
    (sysctl-name "hw.pagesize_compat")
    (sysctl-name "hw.logicalcpu")
    (sysctl-name "hw.logicalcpu_max")
    (sysctl-name "hw.physicalcpu")
    (sysctl-name "hw.physicalcpu_max"))
"#;
